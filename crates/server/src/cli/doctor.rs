use konsul_domain::config::{Config, ConfigSeverity, EngineKind};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("konsul doctor");
    println!("=============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_data_dir(config, &mut all_passed);
    check_jwt_secret(config, &mut all_passed);
    check_root_password(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_data_dir(config: &Config, all_passed: &mut bool) {
    if config.storage.engine != EngineKind::Redb {
        print_check("Data directory", true, "in-memory engine, no disk state".into());
        return;
    }
    let path = std::path::Path::new(&config.storage.data_dir);
    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(path) {
            print_check("Data directory", false, format!("{}: cannot create ({e})", path.display()));
            *all_passed = false;
            return;
        }
    }
    let probe = path.join(".konsul_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);
    print_check(
        "Data directory",
        writable,
        if writable { format!("{} (writable)", path.display()) } else { format!("{} (not writable)", path.display()) },
    );
    if !writable {
        *all_passed = false;
    }
}

fn check_jwt_secret(config: &Config, all_passed: &mut bool) {
    let set = std::env::var(&config.auth.jwt.secret_env).is_ok();
    print_check(
        "JWT signing secret",
        set,
        if set {
            format!("{} is set", config.auth.jwt.secret_env)
        } else {
            format!("{} unset — a random secret will be generated and tokens won't survive a restart", config.auth.jwt.secret_env)
        },
    );
    // Missing signing secret is a warning, not a hard failure — the server still starts.
}

fn check_root_password(config: &Config, all_passed: &mut bool) {
    let set = std::env::var(&config.auth.root.password_env).is_ok();
    print_check(
        "Root login password",
        set,
        if set {
            format!("{} is set", config.auth.root.password_env)
        } else {
            format!("{} unset — POST /auth/login will always reject", config.auth.root.password_env)
        },
    );
    let _ = all_passed;
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
