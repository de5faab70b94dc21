use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AutomationApi;
use crate::models::{TaskRun, TaskRunRequest, User};

/// Problems with the run form, caught before anything is sent.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamError {
    #[error("Select at least one task.")]
    NoTaskSelected,

    #[error("{field} must be a positive whole number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Parse an optional positive number typed into the form.
/// Blank input means "not set" and is left out of the request.
pub fn parse_optional_number(field: &'static str, raw: &str) -> Result<Option<u32>, ParamError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ParamError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parameters shared by every run in one submission, as entered in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub headless: bool,
    pub auto_credentials: bool,
    pub dev_mode: bool,
    pub bloco_id: String,
    pub limit: String,
}

impl RunOptions {
    /// Form defaults for `user`: headless and auto-credentials start on only
    /// for users allowed to use them.
    pub fn for_user(user: &User) -> Self {
        Self {
            headless: user.allow_auto_credentials,
            auto_credentials: user.allow_auto_credentials,
            dev_mode: false,
            bloco_id: String::new(),
            limit: String::new(),
        }
    }

    /// Build one request per selected slug, preserving order.
    pub fn build_requests(
        &self,
        user: &User,
        slugs: &[String],
    ) -> Result<Vec<TaskRunRequest>, ParamError> {
        if slugs.is_empty() {
            return Err(ParamError::NoTaskSelected);
        }

        let bloco_id = parse_optional_number("Block ID", &self.bloco_id)?;
        let limit = parse_optional_number("Limit", &self.limit)?;
        let allow_auto = user.allow_auto_credentials;

        Ok(slugs
            .iter()
            .map(|slug| TaskRunRequest {
                task_slug: slug.clone(),
                headless: allow_auto && self.headless,
                auto_credentials: allow_auto && self.auto_credentials,
                bloco_id,
                limit,
                dev_mode: Some(self.dev_mode),
            })
            .collect())
    }
}

/// Submit runs one at a time. The first failure stops the batch; runs already
/// accepted stay triggered on the server.
pub async fn dispatch_runs(
    api: &dyn AutomationApi,
    requests: &[TaskRunRequest],
) -> Result<Vec<TaskRun>> {
    let mut created = Vec::with_capacity(requests.len());
    for request in requests {
        match api.run_task(request).await {
            Ok(run) => {
                info!(task = %request.task_slug, run_id = %run.id, "Task run dispatched");
                created.push(run);
            }
            Err(e) => {
                warn!(
                    task = %request.task_slug,
                    dispatched = created.len(),
                    error = %e,
                    "Task dispatch failed, skipping remaining tasks"
                );
                return Err(e).with_context(|| format!("Failed to dispatch {}", request.task_slug));
            }
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_user, FakeApi};

    fn slugs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn auto_user() -> User {
        User {
            allow_auto_credentials: true,
            ..sample_user("auto@x.com")
        }
    }

    #[test]
    fn test_parse_optional_number() {
        assert_eq!(parse_optional_number("Block ID", ""), Ok(None));
        assert_eq!(parse_optional_number("Block ID", "   "), Ok(None));
        assert_eq!(parse_optional_number("Block ID", " 55 "), Ok(Some(55)));
        assert!(parse_optional_number("Block ID", "0").is_err());
        assert!(parse_optional_number("Block ID", "-3").is_err());
        assert!(parse_optional_number("Limit", "abc").is_err());
        assert!(parse_optional_number("Limit", "1.5").is_err());
    }

    #[test]
    fn test_empty_bloco_is_omitted_not_zero() {
        let user = auto_user();
        let options = RunOptions::for_user(&user);
        let requests = options.build_requests(&user, &slugs(&["download_zip"])).unwrap();
        assert_eq!(requests[0].bloco_id, None);

        let body = serde_json::to_value(&requests[0]).unwrap();
        assert!(body.get("bloco_id").is_none());
        assert!(body.get("limit").is_none());
    }

    #[test]
    fn test_no_selection_is_rejected() {
        let user = auto_user();
        let options = RunOptions::for_user(&user);
        assert_eq!(options.build_requests(&user, &[]), Err(ParamError::NoTaskSelected));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let user = auto_user();
        let options = RunOptions {
            limit: "many".to_string(),
            ..RunOptions::for_user(&user)
        };
        let err = options.build_requests(&user, &slugs(&["annotate_ok"])).unwrap_err();
        assert!(matches!(err, ParamError::InvalidNumber { field: "Limit", .. }));
    }

    #[test]
    fn test_auto_flags_forced_off_without_permission() {
        let user = sample_user("plain@x.com");
        let options = RunOptions {
            headless: true,
            auto_credentials: true,
            ..RunOptions::for_user(&user)
        };
        let requests = options.build_requests(&user, &slugs(&["annotate_ok"])).unwrap();
        assert!(!requests[0].headless);
        assert!(!requests[0].auto_credentials);
    }

    #[test]
    fn test_defaults_follow_permission() {
        let options = RunOptions::for_user(&auto_user());
        assert!(options.headless && options.auto_credentials && !options.dev_mode);

        let options = RunOptions::for_user(&sample_user("plain@x.com"));
        assert!(!options.headless && !options.auto_credentials);
    }

    #[test]
    fn test_requests_carry_shared_params() {
        let user = auto_user();
        let options = RunOptions {
            bloco_id: "55".to_string(),
            limit: "10".to_string(),
            dev_mode: true,
            ..RunOptions::for_user(&user)
        };
        let requests = options
            .build_requests(&user, &slugs(&["download_zip", "export_relation"]))
            .unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].task_slug, "export_relation");
        assert!(requests.iter().all(|r| r.bloco_id == Some(55) && r.limit == Some(10)));
        assert!(requests.iter().all(|r| r.dev_mode == Some(true) && r.headless));
    }

    #[tokio::test]
    async fn test_dispatch_stops_at_first_failure() {
        let api = FakeApi::new().failing_run("annotate_ok");
        let user = auto_user();
        let requests = RunOptions::for_user(&user)
            .build_requests(&user, &slugs(&["download_zip", "annotate_ok", "export_relation"]))
            .unwrap();

        let result = dispatch_runs(&api, &requests).await;
        assert!(result.is_err());

        let submitted: Vec<String> = api.run_requests().into_iter().map(|r| r.task_slug).collect();
        assert_eq!(submitted, ["download_zip", "annotate_ok"]);
    }

    #[tokio::test]
    async fn test_dispatch_all_succeed() {
        let api = FakeApi::new();
        let user = auto_user();
        let requests = RunOptions::for_user(&user)
            .build_requests(&user, &slugs(&["download_zip", "annotate_ok"]))
            .unwrap();

        let runs = dispatch_runs(&api, &requests).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].task_name, "download_zip");
    }
}
