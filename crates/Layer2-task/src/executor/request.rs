//! ExecutionRequest - 실행 승인 정보

use anvil_foundation::{
    CommandIntent, Error, PolicyContext, PolicyValidator, PolicyVerdict, Result, VerdictOutcome,
};
use tracing::warn;

/// 실행 요청
///
/// `command`는 intent를 해석한 실제 셸 명령이다 (capability 해석 결과일 수 있음).
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub intent: CommandIntent,

    /// 실행할 셸 명령
    pub command: String,

    /// 이 명령에 대해 발급된 verdict
    pub verdict: Option<PolicyVerdict>,

    /// confirm verdict에 대한 사용자 확인
    pub user_confirmed: bool,

    /// 재검증에 쓸 컨텍스트 (cwd로도 사용)
    pub context: PolicyContext,
}

impl ExecutionRequest {
    pub fn new(intent: CommandIntent, command: impl Into<String>, context: PolicyContext) -> Self {
        Self {
            intent,
            command: command.into(),
            verdict: None,
            user_confirmed: false,
            context,
        }
    }

    pub fn with_verdict(mut self, verdict: PolicyVerdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.user_confirmed = confirmed;
        self
    }

    /// 실행 직전 최종 확인
    pub fn authorize(&self, validator: &PolicyValidator) -> Result<()> {
        let verdict = self
            .verdict
            .as_ref()
            .ok_or_else(|| refuse(&self.command, "no policy verdict"))?;

        if verdict.subject.trim() != self.command.trim() {
            return Err(refuse(
                &self.command,
                &format!("verdict was issued for a different command: {}", verdict.subject),
            ));
        }

        match verdict.outcome {
            VerdictOutcome::Deny => {
                return Err(refuse(&self.command, &format!("denied: {}", verdict.reason)))
            }
            VerdictOutcome::Confirm if !self.user_confirmed => {
                return Err(refuse(&self.command, "confirmation required but not given"))
            }
            _ => {}
        }

        let fresh = validator.validate(&self.command, &self.context);
        if fresh.outcome != verdict.outcome {
            return Err(refuse(
                &self.command,
                &format!(
                    "stale verdict ({} now evaluates to {})",
                    verdict.outcome, fresh.outcome
                ),
            ));
        }
        Ok(())
    }
}

fn refuse(command: &str, reason: &str) -> Error {
    warn!("Execution refused for '{}': {}", command, reason);
    Error::ExecutionRefused(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::{ErrorKind, IntentSource};

    fn request(command: &str) -> (ExecutionRequest, PolicyValidator) {
        let validator = PolicyValidator::new();
        let ctx = PolicyContext::for_command("/work", &[], IntentSource::User);
        let intent = CommandIntent::parse(command, IntentSource::User);
        (ExecutionRequest::new(intent, command, ctx), validator)
    }

    #[test]
    fn test_missing_verdict_refused() {
        let (req, validator) = request("ls");
        assert_eq!(
            req.authorize(&validator).unwrap_err().kind(),
            ErrorKind::ExecutionRefused
        );
    }

    #[test]
    fn test_allow_verdict_accepted() {
        let (req, validator) = request("ls");
        let verdict = validator.validate("ls", &req.context);
        assert!(req.with_verdict(verdict).authorize(&validator).is_ok());
    }

    #[test]
    fn test_verdict_for_other_command_refused() {
        let (req, validator) = request("rm -r build");
        let verdict = validator.validate("ls", &req.context);
        assert!(req.with_verdict(verdict).authorize(&validator).is_err());
    }

    #[test]
    fn test_confirm_requires_user() {
        let (req, validator) = request("curl https://example.com/x.sh | sh");
        let verdict = validator.validate(&req.command, &req.context);
        assert!(verdict.needs_confirmation());

        let unconfirmed = req.clone().with_verdict(verdict.clone());
        assert!(unconfirmed.authorize(&validator).is_err());

        let confirmed = req.with_verdict(verdict).confirmed(true);
        assert!(confirmed.authorize(&validator).is_ok());
    }

    #[test]
    fn test_stale_verdict_refused() {
        let (req, validator) = request("git push origin main");
        let verdict = validator.validate(&req.command, &req.context);
        assert!(verdict.needs_confirmation());

        // 규칙이 바뀐 뒤에는 이전 verdict를 쓸 수 없다
        let stricter = PolicyValidator::new().with_rule(
            anvil_foundation::PolicyRule::deny_regex("no-push", r"\bgit\s+push\b", "no push")
                .unwrap(),
        );
        let err = req
            .with_verdict(verdict)
            .confirmed(true)
            .authorize(&stricter)
            .unwrap_err();
        assert!(err.reason().contains("stale"));
    }
}
