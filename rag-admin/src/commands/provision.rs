use anyhow::Context;
use rag_store::{
    Provisioner, RagConfig, StepOutcome,
    provision::{ProvisionError, StepReport},
};
use services::aws::default_provider;

pub async fn run() -> anyhow::Result<()> {
    let cfg = RagConfig::from_env().context("invalid index configuration")?;
    let creds = default_provider().context("no AWS credentials available")?;
    let provisioner = Provisioner::new(cfg, creds)?;

    match provisioner.run().await {
        Ok(report) => {
            print!("{}", render_steps(&report.steps));
            println!("endpoint: {}", report.endpoint);
            Ok(())
        }
        Err(err) => {
            print!("{}", render_failure(&err));
            Err(err.into())
        }
    }
}

pub fn render_steps(steps: &[StepReport]) -> String {
    steps
        .iter()
        .map(|s| {
            let outcome = match s.outcome {
                StepOutcome::Created => "created",
                StepOutcome::AlreadyExisted => "already existed",
            };
            format!("  {:<20} {outcome}\n", s.step.to_string())
        })
        .collect()
}

fn render_failure(err: &ProvisionError) -> String {
    format!("{}  {:<20} FAILED\n", render_steps(&err.completed), err.step.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::provision::ProvisionStep;

    #[test]
    fn steps_render_one_line_each() {
        let out = render_steps(&[
            StepReport { step: ProvisionStep::EncryptionPolicy, outcome: StepOutcome::AlreadyExisted },
            StepReport { step: ProvisionStep::Collection, outcome: StepOutcome::Created },
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("encryption policy") && lines[0].ends_with("already existed"));
        assert!(lines[1].ends_with("created"));
    }
}
