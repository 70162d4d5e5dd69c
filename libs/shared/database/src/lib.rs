pub mod error;
pub mod memory;
pub mod postgrest;
pub mod seed;
pub mod state;
pub mod store;
pub mod supabase;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgrest::SupabaseStore;
pub use seed::{seed_demo_clinic, DemoClinic};
pub use state::AppState;
pub use store::{bounded, ClinicStore};
