//! 기본 규칙 세트
//!
//! priority 계층: 파괴적 패턴 거부 100, 구조적 경로 거부 90, 확인 50, 허용 10

use super::rule::{PolicyAction, PolicyRule, RulePattern, RuleScope};
use super::verdict::RiskLevel;
use std::path::PathBuf;
use tracing::warn;

// ============================================================
// 금지 패턴 (항상 차단, 컨텍스트 무관)
// ============================================================

/// 명령 위치 접두어 (줄 시작, 구분자, 따옴표, 서브셸)
const CMD_POS: &str = r#"(?:^|[;&|(`"'{]|\$\()\s*"#;

fn forbidden_patterns() -> Vec<(&'static str, String, &'static str)> {
    vec![
        // 루트 수준 경로 재귀 삭제
        (
            "recursive-delete-root",
            r"\brm\s+(?:-\S+\s+)*-\S*[rR]\S*\s+(?:-\S+\s+)*(?:/|/\*|~/?|\$HOME/?|/[A-Za-z0-9_.-]+/?)(?:\s|$|;|&|\||\x22|')".to_string(),
            "Recursive deletion of a root-level path",
        ),
        (
            "no-preserve-root",
            r"--no-preserve-root".to_string(),
            "Root filesystem deletion",
        ),
        // Fork bomb
        (
            "fork-bomb",
            r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:".to_string(),
            "Fork bomb",
        ),
        (
            "fork-bomb-named",
            r"\b(\w+)\(\)\s*\{\s*\w+\s*\|\s*\w+\s*&\s*\}".to_string(),
            "Fork bomb",
        ),
        // 권한 상승
        (
            "privilege-escalation",
            format!(r"{}(?:sudo|su|doas|pkexec|runas)(?:\s|$)", CMD_POS),
            "Privilege escalation",
        ),
        (
            "setuid",
            r"\bchmod\s+(?:-\S+\s+)*[ugoa]*\+s\b".to_string(),
            "Setuid permission change",
        ),
        (
            "chmod-root",
            r"\bchmod\s+(?:-R\s+)?777\s+/(?:\s|$)".to_string(),
            "Dangerous permission change",
        ),
        // 디스크 파괴
        (
            "disk-overwrite",
            r"\bdd\s+.*of=/dev/(?:sd|hd|nvme|xvd|vd)[a-z0-9]*".to_string(),
            "Disk overwrite",
        ),
        (
            "disk-redirect",
            r">\s*/dev/(?:sd|hd|nvme|xvd|vd)[a-z0-9]*".to_string(),
            "Disk overwrite",
        ),
        ("mkfs", r"\bmkfs(?:\.\w+)?\b".to_string(), "Filesystem format"),
        // 시스템 종료
        (
            "system-power",
            format!(r"{}(?:shutdown|reboot|halt|poweroff|init\s+[06])(?:\s|$)", CMD_POS),
            "System shutdown or reboot",
        ),
        // 네트워크 악용
        ("reverse-shell", r"/dev/(?:tcp|udp)/".to_string(), "Reverse shell"),
        (
            "netcat-pipe",
            r"\|\s*(?:nc|netcat|ncat)\s".to_string(),
            "Potential reverse shell",
        ),
        // 흔적 삭제
        ("history-clear", r"\bhistory\s+-c\b".to_string(), "History clear"),
        // 커널 모듈
        (
            "kernel-module",
            r"\b(?:insmod|rmmod|modprobe)\s+".to_string(),
            "Kernel module loading",
        ),
        // 무차별 프로세스 종료
        (
            "mass-kill",
            r"\b(?:killall|pkill)\s+-9\b|\bkill\s+-9\s+-1\b".to_string(),
            "Mass process kill",
        ),
        ("crontab-wipe", r"\bcrontab\s+-r\b".to_string(), "Crontab removal"),
    ]
}

// ============================================================
// 확인 필요 패턴 (부작용은 있으나 파괴적이진 않음)
// ============================================================

fn confirm_patterns() -> Vec<(&'static str, &'static str, &'static str, RiskLevel)> {
    vec![
        (
            "fetch-and-execute",
            r"\b(?:curl|wget)\b[^|\n]*\|\s*(?:sudo\s+)?(?:sh|bash|zsh|dash|python3?|perl|ruby)\b",
            "Downloads and executes remote code",
            RiskLevel::Critical,
        ),
        (
            "pipe-to-shell",
            r"\|\s*(?:sh|bash|zsh|dash)(?:\s|$)",
            "Pipes data into a shell",
            RiskLevel::High,
        ),
        (
            "eval",
            r"(?:^|[;&|]\s*)eval\s",
            "Evaluates dynamic shell code",
            RiskLevel::High,
        ),
        (
            "recursive-delete",
            r"\brm\s+(?:-\S+\s+)*-\S*[rR]",
            "Recursive deletion",
            RiskLevel::High,
        ),
        (
            "process-kill",
            r"(?:^|[;&|]\s*)(?:kill|pkill|killall)\s",
            "Terminates processes",
            RiskLevel::High,
        ),
        (
            "recursive-permission",
            r"\b(?:chmod|chown|chgrp)\s+-R\b",
            "Recursive permission change",
            RiskLevel::High,
        ),
        (
            "package-install",
            r"\b(?:apt|apt-get|yum|dnf|brew|pip3?|npm|yarn|pnpm|cargo|gem)\s+(?:install|uninstall|remove|add)\b",
            "Installs or removes packages",
            RiskLevel::Medium,
        ),
        (
            "git-remote-write",
            r"\bgit\s+(?:push|reset\s+--hard|clean\s+-\S*f)",
            "Rewrites git history or remote state",
            RiskLevel::Medium,
        ),
        (
            "remote-access",
            r"(?:^|[;&|]\s*)(?:ssh|scp|rsync|telnet|ftp|sftp)\s",
            "Remote network access",
            RiskLevel::Medium,
        ),
        (
            "network-fetch",
            r"(?:^|[;&|]\s*)(?:curl|wget)\s",
            "Network fetch",
            RiskLevel::Medium,
        ),
        (
            "find-exec",
            r"\bfind\b.*\s-(?:exec|execdir|ok|delete)\b",
            "find with side-effecting actions",
            RiskLevel::High,
        ),
        (
            "container-destroy",
            r"\bdocker\s+(?:rm|rmi|system\s+prune|volume\s+rm)\b",
            "Removes containers or images",
            RiskLevel::Medium,
        ),
    ]
}

/// 기본 규칙 전체 (우선순위 포함)
pub fn builtin_rules() -> Vec<PolicyRule> {
    let mut rules = Vec::new();

    for (id, pattern, reason) in forbidden_patterns() {
        match PolicyRule::deny_regex(id, &pattern, reason) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("Skipping built-in rule {}: {}", id, e),
        }
    }

    // 구조적 경로 규칙
    rules.push(
        PolicyRule::new(
            "restricted-write",
            RulePattern::RestrictedWrite,
            RuleScope::Path,
            PolicyAction::Deny,
        )
        .with_priority(90)
        .with_risk(RiskLevel::High)
        .with_reason("Write into a restricted system or sensitive location"),
    );
    rules.push(
        PolicyRule::new(
            "path-traversal",
            RulePattern::OutsideWorkingRoot,
            RuleScope::Path,
            PolicyAction::Deny,
        )
        .with_priority(90)
        .with_risk(RiskLevel::High)
        .with_reason("Path escapes the working directory root"),
    );
    rules.push(
        PolicyRule::new(
            "write-outside-allowed-dirs",
            RulePattern::OutsideWritableRoots,
            RuleScope::Path,
            PolicyAction::Deny,
        )
        .with_priority(90)
        .with_risk(RiskLevel::High)
        .with_reason("Write target outside the designated plugin/template/data directories"),
    );

    for (id, pattern, reason, risk) in confirm_patterns() {
        match PolicyRule::confirm_regex(id, pattern, reason) {
            Ok(rule) => rules.push(rule.with_risk(risk)),
            Err(e) => warn!("Skipping built-in rule {}: {}", id, e),
        }
    }

    rules.push(
        PolicyRule::new(
            "artifact-in-extension-dir",
            RulePattern::TargetInsideWritableRoots,
            RuleScope::Path,
            PolicyAction::Allow,
        )
        .with_reason("Artifact target is inside a designated extension directory"),
    );

    rules
}

// ============================================================
// 안전 명령 / 제한 경로
// ============================================================

/// 규칙 매칭이 없을 때 자동 허용되는 verb
pub fn safe_verbs() -> Vec<&'static str> {
    vec![
        // 파일 조회
        "ls", "dir", "pwd", "cd", "cat", "head", "tail", "less", "more", "wc", "file", "stat",
        "tree", "find", "du", "df",
        // 검색
        "grep", "rg", "ag", "which", "whereis", "type",
        // 텍스트 처리 (출력만)
        "echo", "printf", "sort", "uniq", "cut", "tr", "diff", "basename", "dirname", "realpath",
        "jq",
        // 시스템 정보
        "date", "cal", "uptime", "whoami", "id", "hostname", "uname", "printenv", "ps", "free",
        "true", "false", "sleep", "test",
        // 버전 관리 (원격/파괴적 하위 명령은 확인 규칙이 먼저 잡는다)
        "git",
    ]
}

/// 쓰기 금지 루트
pub fn restricted_roots() -> Vec<PathBuf> {
    ["/etc", "/var", "/boot", "/root", "/proc", "/sys", "/usr", "/bin", "/sbin", "/lib"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

/// 민감 경로 glob
pub fn sensitive_patterns() -> Vec<String> {
    [
        "**/.env",
        "**/.env.*",
        "**/*.pem",
        "**/*.key",
        "**/id_rsa*",
        "**/id_ed25519*",
        "~/.ssh/**",
        "~/.aws/**",
        "~/.gnupg/**",
        "~/.bash_history",
        "~/.zsh_history",
        "~/.bashrc",
        "~/.zshrc",
        "~/.profile",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
