mod supabase;
mod tables;

pub use supabase::{DbError, SupabaseClient};
