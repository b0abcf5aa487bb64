use std::io::{self, Write};
use syllabus_core::config::{PASSWORD_ENV, USERNAME_ENV};
use syllabus_core::Config;

use super::Context;

pub async fn run(ctx: &Context, force: bool) -> anyhow::Result<()> {
    let path = &ctx.config_path;

    if path.exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    ctx.paths.ensure_dirs()?;
    Config::default().save(path)?;
    println!("✓ Created config: {}", path.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Add credentials to {} or export {} / {}",
        path.display(),
        USERNAME_ENV,
        PASSWORD_ENV
    );
    println!("  2. Run `syllabi doctor` to verify the setup");
    println!("  3. Run `syllabi run` to download the syllabi");

    Ok(())
}
