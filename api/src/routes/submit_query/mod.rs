pub mod submit_query_request;
pub mod submit_query_route;
