use crate::{
    context::Context,
    lazy::Lazy,
    module::{Module, TaskResult},
};

/// Always fails, with `msg` as the error.
#[derive(Debug, Default)]
pub struct Fail {
    pub msg: Lazy<Option<String>>,
}

impl Module for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    fn apply(&mut self, ctx: &Context) -> TaskResult {
        let message = match self.msg.eval(ctx) {
            Ok(Some(msg)) => msg,
            Ok(None) => "failed as requested".to_string(),
            Err(err) => err.to_string(),
        };
        TaskResult::failed(self.name(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::lazy;

    #[test]
    fn test_fails_with_message() {
        let mut module = Fail { msg: lazy("boom") };
        let result = module.apply(&Context::default());

        assert!(!result.succeeded);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.module, "fail");
    }

    #[test]
    fn test_default_message() {
        let result = Fail::default().apply(&Context::default());
        assert_eq!(result.error.as_deref(), Some("failed as requested"));
    }
}
