pub mod supabase;

pub use supabase::{SupabaseClient, SupabaseError, prefer_representation};
