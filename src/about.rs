pub const DISPLAY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_cli_text() -> String {
    format!("blastq {}\nNCBI BLAST DNA search client", DISPLAY_VERSION)
}
