//! LLM 프롬프트

use anvil_foundation::CapabilityRecord;
use std::path::Path;

/// 출력 미리보기 상한 (문자)
const OUTPUT_PREVIEW_CHARS: usize = 2000;

/// 시스템 프롬프트
///
/// 작업 디렉토리, 사용자, OS, 메모리 컨텍스트, 사용 가능한 capability 목록을 포함한다.
pub fn system_prompt(
    working_dir: &Path,
    capabilities: &[CapabilityRecord],
    memory_context: &str,
) -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string());

    let mut prompt = format!(
        r#"You are Anvil, a command-line assistant that runs shell commands for the user.

Guidelines for command execution:
- When the request needs a command, reply with exactly one command in a ```bash code block, followed by a one-line explanation.
- Prefer the available capabilities listed below over ad-hoc pipelines.
- Only propose commands that are safe; never use sudo, never delete outside the working directory.
- When the request is a question that needs no command, answer briefly without a code block.

Current working directory: {cwd}
Current user: {user}
Operating system: {os}"#,
        cwd = working_dir.display(),
        user = user,
        os = std::env::consts::OS,
    );

    if !capabilities.is_empty() {
        let lines: Vec<String> = capabilities
            .iter()
            .map(|c| format!("- {} ({}): {}", c.invocation_grammar, c.kind, c.description))
            .collect();
        prompt.push_str("\n\nAvailable capabilities:\n");
        prompt.push_str(&lines.join("\n"));
    }

    if !memory_context.is_empty() {
        prompt.push_str("\n\nMemory context:\n");
        prompt.push_str(memory_context);
    }

    prompt
}

/// 자연어 요청을 명령으로 바꿔 달라는 프롬프트
pub fn command_request_prompt(request: &str) -> String {
    format!(
        "The user asked:\n\n{}\n\nIf this needs a shell command, give exactly one command in a ```bash block.",
        request
    )
}

/// 실패한 명령에 대한 후속 분석 프롬프트
pub fn error_analysis_prompt(command: &str, exit_code: i32, output: &str) -> String {
    format!(
        r#"I executed the command:

```
{command}
```

It exited with code {exit_code} and printed:

```
{output}
```

Explain briefly what caused the failure. If a different command would work, give exactly one in a ```bash block."#,
        command = command,
        exit_code = exit_code,
        output = preview(output),
    )
}

fn preview(output: &str) -> String {
    if output.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return output.to_string();
    }
    let head: String = output.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    format!("{}\n[... output truncated ...]", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_capabilities() {
        let ls = CapabilityRecord::builtin("ls", "ls [path...]", "List directory contents", &["list"]);
        let prompt = system_prompt(Path::new("/work"), &[ls], "Recent commands:\n- pwd (success)");
        assert!(prompt.contains("/work"));
        assert!(prompt.contains("- ls [path...] (builtin): List directory contents"));
        assert!(prompt.contains("pwd (success)"));
    }

    #[test]
    fn test_error_prompt_truncates_output() {
        let output = "x".repeat(OUTPUT_PREVIEW_CHARS + 10);
        let prompt = error_analysis_prompt("make", 2, &output);
        assert!(prompt.contains("code 2"));
        assert!(prompt.contains("output truncated"));
    }
}
