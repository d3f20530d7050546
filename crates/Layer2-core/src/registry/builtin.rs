//! 기본 내장 capability 목록

use anvil_foundation::CapabilityRecord;

/// (이름, 호출 문법, 설명, 키워드)
const BUILTINS: &[(&str, &str, &str, &[&str])] = &[
    ("ls", "ls [options] [path...]", "List directory contents", &["list", "files", "directory", "folder", "contents"]),
    ("pwd", "pwd", "Print the working directory", &["where", "current", "directory", "path"]),
    ("cat", "cat <file...>", "Print file contents", &["read", "print", "contents", "file", "view"]),
    ("head", "head [-n N] <file>", "Show the first lines of a file", &["first", "beginning", "top", "lines"]),
    ("tail", "tail [-n N] <file>", "Show the last lines of a file", &["last", "end", "bottom", "lines"]),
    ("wc", "wc [options] <file...>", "Count lines, words and bytes", &["count", "lines", "words"]),
    ("grep", "grep [options] <pattern> [file...]", "Search text by pattern", &["search", "match", "pattern", "text"]),
    ("find", "find <path> [expression]", "Find files by name or attribute", &["find", "locate", "files", "named"]),
    ("echo", "echo [text...]", "Print text", &["say", "print", "text"]),
    ("date", "date [+format]", "Show the current date and time", &["time", "date", "today", "now"]),
    ("whoami", "whoami", "Show the current user", &["user", "who", "username"]),
    ("df", "df [-h] [path]", "Show free disk space", &["disk", "space", "free", "filesystem"]),
    ("du", "du [-sh] [path...]", "Show disk usage of files", &["usage", "size", "big"]),
    ("ps", "ps [options]", "List running processes", &["processes", "process", "running"]),
    ("mkdir", "mkdir [-p] <dir...>", "Create directories", &["make", "create", "directory", "folder"]),
    ("touch", "touch <file...>", "Create empty files or update timestamps", &["touch", "empty", "timestamp"]),
    ("cp", "cp [options] <source> <dest>", "Copy files", &["copy", "duplicate"]),
    ("mv", "mv <source> <dest>", "Move or rename files", &["move", "rename"]),
    ("git", "git <status|log|diff> [args...]", "Inspect a git repository", &["git", "repository", "commit", "branch"]),
];

/// 내장 capability 레코드 (항상 active, 목록 순서 고정)
pub fn builtin_capabilities() -> Vec<CapabilityRecord> {
    BUILTINS
        .iter()
        .map(|(name, grammar, description, keywords)| {
            CapabilityRecord::builtin(name, grammar, description, keywords)
        })
        .collect()
}
