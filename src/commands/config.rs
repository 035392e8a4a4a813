//! `gp config` — read and write persisted settings.

use anyhow::Result;
use colored::Colorize;

use crate::session::Session;

pub fn get(session: &Session, key: &str) -> Result<()> {
    match key {
        "proxy" => {
            println!("http_proxy = {}", session.config.http_proxy.as_deref().unwrap_or(""));
        }
        "github" => {
            println!(
                "github_client_id = {}",
                session.config.github_client_id.as_deref().unwrap_or("")
            );
            println!(
                "github_client_secret = {}",
                session.config.github_client_secret.as_deref().unwrap_or("")
            );
        }
        _ => anyhow::bail!("unknown setting: {key}"),
    }
    Ok(())
}

pub fn set(session: &mut Session, key: &str, values: &[String]) -> Result<()> {
    match (key, values) {
        ("proxy", [proxy]) => {
            session.config.http_proxy = Some(proxy.clone());
        }
        ("github", [id, secret]) => {
            session.config.github_client_id = Some(id.clone());
            session.config.github_client_secret = Some(secret.clone());
        }
        ("proxy", _) => anyhow::bail!("'set proxy' takes exactly one value"),
        ("github", _) => anyhow::bail!("'set github' takes a client id and a client secret"),
        _ => anyhow::bail!("unknown setting: {key}"),
    }
    session.save_config()?;
    println!("{} Setting saved.", "✓".green());
    Ok(())
}

pub fn unset(session: &mut Session, key: &str) -> Result<()> {
    match key {
        "proxy" => session.config.http_proxy = None,
        "github" => {
            session.config.github_client_id = None;
            session.config.github_client_secret = None;
        }
        _ => anyhow::bail!("unknown setting: {key}"),
    }
    session.save_config()?;
    println!("{} Setting removed.", "✓".green());
    Ok(())
}
