//! Build script for the server crate.
//!
//! Migrations are embedded with `sqlx::migrate!`, which does not track new
//! files on its own. Rebuild whenever the migrations directory changes.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
