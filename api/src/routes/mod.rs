pub mod echo_route;
pub mod health_route;
pub mod submit_query;
