//! Deployment context for mirrored error reports
//!
//! Resolved once from a key lookup supplied by the host (usually a thin
//! wrapper over the process environment). Nothing in this crate reads the
//! environment directly.

use crate::telemetry::error_tracker::{LOGS_URL_TAG, PLATFORM_TAG};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const LAMBDA_LOG_GROUP_NAME: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
pub const LAMBDA_LOG_STREAM_NAME: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
pub const ECS_METADATA_URI: &str = "ECS_CONTAINER_METADATA_URI_V4";
pub const ECS_SERVICE_NAME: &str = "ECS_SERVICE_NAME";
pub const FARGATE_TASK_NAME: &str = "FARGATE_TASK_NAME";
pub const ECS_LOG_GROUP_NAME: &str = "AWS_ECS_LOG_GROUP_NAME";
pub const ECS_LOG_STREAM_NAME: &str = "AWS_ECS_LOG_STREAM_NAME";
pub const REGION: &str = "AWS_REGION";

const REGION_TAG: &str = "region";
const SERVICE_TAG: &str = "service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentPlatform {
    Lambda,
    Ecs,
    #[default]
    Unknown,
}

impl DeploymentPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentPlatform::Lambda => "lambda",
            DeploymentPlatform::Ecs => "ecs",
            DeploymentPlatform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeploymentPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the process runs and where its logs end up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentInfo {
    pub platform: DeploymentPlatform,
    pub service: Option<String>,
    pub region: Option<String>,
    pub log_group: Option<String>,
    pub log_stream: Option<String>,
}

impl DeploymentInfo {
    /// Resolve from `lookup`. Empty values count as unset.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_correlated_logger::core::{DeploymentInfo, DeploymentPlatform};
    ///
    /// let info = DeploymentInfo::from_lookup(|key| match key {
    ///     "AWS_LAMBDA_FUNCTION_NAME" => Some("scanner".to_string()),
    ///     "AWS_REGION" => Some("us-east-1".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(info.platform, DeploymentPlatform::Lambda);
    /// assert_eq!(info.service.as_deref(), Some("scanner"));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let region = get(REGION);

        if let Some(function) = get(LAMBDA_FUNCTION_NAME) {
            return Self {
                platform: DeploymentPlatform::Lambda,
                service: Some(function),
                region,
                log_group: get(LAMBDA_LOG_GROUP_NAME),
                log_stream: get(LAMBDA_LOG_STREAM_NAME),
            };
        }

        let ecs_service = get(FARGATE_TASK_NAME).or_else(|| get(ECS_SERVICE_NAME));
        if ecs_service.is_some() || get(ECS_METADATA_URI).is_some() {
            return Self {
                platform: DeploymentPlatform::Ecs,
                service: ecs_service,
                region,
                log_group: get(ECS_LOG_GROUP_NAME),
                log_stream: get(ECS_LOG_STREAM_NAME),
            };
        }

        Self {
            region,
            ..Self::default()
        }
    }

    /// Resolve from a fixed map, mostly for tests and config files
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// CloudWatch console link for this deployment's log stream, when the
    /// region, group and stream are all known
    pub fn logs_url(&self) -> Option<String> {
        match (&self.region, &self.log_group, &self.log_stream) {
            (Some(region), Some(group), Some(stream)) => Some(format_logs_url(region, group, stream)),
            _ => None,
        }
    }

    /// Tags attached to every mirrored error report
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        if self.platform != DeploymentPlatform::Unknown {
            tags.insert(PLATFORM_TAG.to_string(), self.platform.to_string());
        }
        if let Some(url) = self.logs_url() {
            tags.insert(LOGS_URL_TAG.to_string(), url);
        }
        if let Some(region) = &self.region {
            tags.insert(REGION_TAG.to_string(), region.clone());
        }
        if let Some(service) = &self.service {
            tags.insert(SERVICE_TAG.to_string(), service.clone());
        }
        tags
    }
}

/// Quote a path segment the way the CloudWatch console does: percent-encode,
/// then encode the `%` itself as `$25`
fn console_escape(segment: &str) -> String {
    urlencoding::encode(segment).replace('%', "$25")
}

pub fn format_logs_url(region: &str, log_group: &str, log_stream: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudwatch/home?region={region}#logsV2:log-groups/log-group/{}/log-events/{}",
        console_escape(log_group),
        console_escape(log_stream),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> DeploymentInfo {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeploymentInfo::from_map(&map)
    }

    #[test]
    fn test_format_logs_url() {
        let url = format_logs_url(
            "ap-southeast-2",
            "/aws/lambda/foxsports-the-force-pullrequest",
            "2024/07/22/[$LATEST]83b2196b0fb5466e9e71f9e6c9eceab8",
        );
        assert_eq!(
            url,
            "https://ap-southeast-2.console.aws.amazon.com/cloudwatch/home?region=ap-southeast-2#logsV2:log-groups/log-group/\
             $252Faws$252Flambda$252Ffoxsports-the-force-pullrequest/log-events/\
             2024$252F07$252F22$252F$255B$2524LATEST$255D83b2196b0fb5466e9e71f9e6c9eceab8"
        );
    }

    #[test]
    fn test_console_escape_keeps_unreserved() {
        assert_eq!(console_escape("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(console_escape("x y/é"), "x$2520y$252F$25C3$25A9");
    }

    #[test]
    fn test_lambda_detection() {
        let info = lookup_from(&[
            (LAMBDA_FUNCTION_NAME, "scanner"),
            (LAMBDA_LOG_GROUP_NAME, "/aws/lambda/scanner"),
            (LAMBDA_LOG_STREAM_NAME, "2024/07/22/[$LATEST]abc"),
            (REGION, "us-east-1"),
        ]);
        assert_eq!(info.platform, DeploymentPlatform::Lambda);

        let tags = info.tags();
        assert_eq!(tags.get(PLATFORM_TAG).map(String::as_str), Some("lambda"));
        assert_eq!(tags.get("service").map(String::as_str), Some("scanner"));
        assert!(tags[LOGS_URL_TAG].starts_with("https://us-east-1.console.aws.amazon.com/"));
    }

    #[test]
    fn test_ecs_detection_prefers_task_name() {
        let info = lookup_from(&[
            (ECS_SERVICE_NAME, "svc"),
            (FARGATE_TASK_NAME, "task"),
            (ECS_LOG_GROUP_NAME, "group"),
        ]);
        assert_eq!(info.platform, DeploymentPlatform::Ecs);
        assert_eq!(info.service.as_deref(), Some("task"));
        // No region or stream, so no link
        assert!(info.logs_url().is_none());
        assert!(!info.tags().contains_key(LOGS_URL_TAG));
    }

    #[test]
    fn test_unknown_platform_has_no_platform_tag() {
        let info = lookup_from(&[(REGION, "eu-west-1"), (LAMBDA_FUNCTION_NAME, "")]);
        assert_eq!(info.platform, DeploymentPlatform::Unknown);
        let tags = info.tags();
        assert!(!tags.contains_key(PLATFORM_TAG));
        assert_eq!(tags.get("region").map(String::as_str), Some("eu-west-1"));
    }
}
