use syllabus_browser::{find_browser_binary, BrowserEngine};
use syllabus_core::config::{PASSWORD_ENV, USERNAME_ENV};

use super::Context;

/// Check everything a run needs before opening a browser.
pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    println!();
    println!("🩺 syllabi doctor");
    println!("================================");
    println!();

    let mut ok_count = 0u32;
    let mut err_count = 0u32;

    // --- 1. Config ---
    println!("📋 Configuration");
    if ctx.config_path.exists() {
        print_ok("Config file exists", &ctx.config_path.display().to_string());
        ok_count += 1;
    } else {
        print_warn("Config file not found", "Using defaults; run `syllabi init` to create one");
    }

    let config = match ctx.load_config() {
        Ok(config) => {
            print_ok("Config parses", "");
            ok_count += 1;
            config
        }
        Err(e) => {
            print_err("Config does not parse", &format!("{:#}", e));
            println!();
            println!("{} ok, 1 error", ok_count);
            return Err(e);
        }
    };

    if config.credentials.is_complete() {
        print_ok("Credentials configured", &config.credentials.username);
        ok_count += 1;
    } else {
        print_err(
            "Credentials missing",
            &format!("Set them in the config or export {} / {}", USERNAME_ENV, PASSWORD_ENV),
        );
        err_count += 1;
    }

    match config.validate() {
        Ok(()) => {
            print_ok("Config valid", "");
            ok_count += 1;
        }
        Err(e) if config.credentials.is_complete() => {
            print_err("Config invalid", &e.to_string());
            err_count += 1;
        }
        Err(_) => {}
    }
    println!("  Portal: {}", config.portal.login_url);
    println!();

    // --- 2. Browser ---
    println!("🌐 Browser");
    let engine = BrowserEngine::parse(&config.browser.engine);
    match find_browser_binary(engine) {
        Some(binary) => {
            print_ok(&format!("{} found", engine.name()), &binary);
            ok_count += 1;
        }
        None => {
            print_err(
                &format!("{} not found", engine.name()),
                "Install it or set browser.engine in the config",
            );
            err_count += 1;
        }
    }
    println!();

    // --- 3. Output ---
    println!("📁 Output");
    let downloads = ctx.paths.downloads_dir();
    match std::fs::create_dir_all(&downloads) {
        Ok(()) => {
            let probe = downloads.join(".doctor_test");
            match std::fs::write(&probe, "test") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe);
                    print_ok("Downloads directory writable", &downloads.display().to_string());
                    ok_count += 1;
                }
                Err(e) => {
                    print_err("Downloads directory not writable", &e.to_string());
                    err_count += 1;
                }
            }
        }
        Err(e) => {
            print_err("Cannot create downloads directory", &e.to_string());
            err_count += 1;
        }
    }
    if ctx.paths.report_file().exists() {
        println!(
            "  Previous report: {}",
            ctx.paths.report_file().display()
        );
    }
    println!();

    println!("{} ok, {} error(s)", ok_count, err_count);
    if err_count > 0 {
        anyhow::bail!("{} check(s) failed", err_count);
    }
    Ok(())
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ⚠️  {}", label);
    } else {
        println!("  ⚠️  {} — {}", label, hint);
    }
}

fn print_err(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ❌ {}", label);
    } else {
        println!("  ❌ {} — {}", label, hint);
    }
}
