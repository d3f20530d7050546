//! Non-interactive subcommands

use crate::display_path;
use anvil_agent::Orchestrator;
use anvil_foundation::{
    AgentConfig, CapabilityKind, CapabilityRecord, IntentSource, PolicyContext, PolicyValidator,
    PolicyVerdict,
};
use anvil_provider::ScriptedClient;
use std::path::Path;
use std::sync::Arc;

/// `anvil capabilities [--kind K]`
pub fn capabilities(config: &AgentConfig, kind: Option<CapabilityKind>) -> anyhow::Result<()> {
    // 목록만 보므로 LLM 없이 구성
    let mut agent = Orchestrator::from_config(config, Arc::new(ScriptedClient::unavailable()))?;
    agent.load()?;

    let records = agent.registry().list(kind);
    if records.is_empty() {
        println!("No capabilities registered.");
        return Ok(());
    }
    for line in capability_table(&records, &config.paths.working_dir) {
        println!("{}", line);
    }
    Ok(())
}

/// `anvil check <command>`
pub fn check(config: &AgentConfig, command: &str) -> anyhow::Result<()> {
    let validator = PolicyValidator::from_settings(&config.policy)?;
    let ctx = PolicyContext::for_command(
        &config.paths.working_dir,
        &config.paths.command_writable_roots(),
        IntentSource::User,
    );
    let verdict = validator.validate(command, &ctx);
    for line in verdict_lines(&verdict) {
        println!("{}", line);
    }
    Ok(())
}

fn capability_table(records: &[CapabilityRecord], working_dir: &Path) -> Vec<String> {
    let width = records.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    let mut lines = vec![format!(
        "{:<width$}  {:<15}  {:<18}  {:>3}  {}",
        "NAME",
        "KIND",
        "STATUS",
        "VER",
        "USAGE",
        width = width
    )];
    for record in records {
        let mut line = format!(
            "{:<width$}  {:<15}  {:<18}  {:>3}  {}",
            record.name,
            record.kind.as_str(),
            record.status.as_str(),
            record.version,
            record.invocation_grammar,
            width = width
        );
        if let Some(path) = record.source_path() {
            line.push_str(&format!("  ({})", display_path(path, working_dir)));
        }
        lines.push(line);
    }
    lines
}

fn verdict_lines(verdict: &PolicyVerdict) -> Vec<String> {
    let mut lines = vec![
        format!("verdict: {}", verdict.outcome),
        format!("risk:    {}", verdict.risk),
        format!("reason:  {}", verdict.reason),
    ];
    if let Some(rule) = &verdict.matched_rule {
        lines.push(format!("rule:    {}", rule));
    }
    if verdict.needs_confirmation() {
        let safer = PolicyValidator::sanitize(&verdict.subject);
        if safer != verdict.subject {
            lines.push(format!("safer:   {}", safer));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::CapabilityStatus;

    #[test]
    fn test_verdict_lines_suggest_safer_variant() {
        let validator = PolicyValidator::new();
        let ctx = PolicyContext::for_command("/work", &[], IntentSource::User);
        let verdict = validator.validate("rm -rf build", &ctx);
        assert!(verdict.needs_confirmation());

        let lines = verdict_lines(&verdict);
        assert_eq!(lines[0], "verdict: confirm");
        assert!(lines.iter().any(|l| l.starts_with("rule:    recursive-delete")));
        assert!(lines.iter().any(|l| l.starts_with("safer:") && l.contains("-i")));
    }

    #[test]
    fn test_capability_table_shows_relative_source() {
        let records = vec![
            CapabilityRecord::builtin("ls", "ls [path...]", "List", &["list"]),
            CapabilityRecord::new("docker", CapabilityKind::Plugin, "docker <action>")
                .with_source("/work/plugins/docker.json")
                .with_status(CapabilityStatus::Active),
        ];
        let lines = capability_table(&records, Path::new("/work"));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].contains("plugin"));
        assert!(lines[2].ends_with("(plugins/docker.json)"));
    }
}
