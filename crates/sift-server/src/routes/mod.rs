//! API routes.

pub mod components;
pub mod health;

pub use components::{
    CatalogResponse, CreateQuery, FinalResult, ListSessionsResponse, OutputColumnsResponse,
    OutputStyle, ProcessInput, ProcessOutput, StatelessInput, StatelessOutput, StatelessQuery,
    catalog_handler, component_routes, create_session_handler, delete_session_handler,
    descriptor_handler, list_sessions_handler, output_columns_handler, process_handler,
    stateless_handler,
};
pub use health::{HealthResponse, health_routes};
