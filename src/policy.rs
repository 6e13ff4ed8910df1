//! Inline session policy for downscoped dashboard credentials
//!
//! The policy narrows an assumed role to read-only access on one
//! workspace: its catalog resources and the objects in its bucket.

use serde_json::json;

use crate::error::PolicyError;
use crate::models::catalog::Workspace;

/// Inline session policies above this many characters are rejected by the token service
pub const MAX_POLICY_LENGTH: usize = 2048;

const POLICY_VERSION: &str = "2012-10-17";

/// Builds the inline session policy for a workspace
pub trait PolicySynthesizer: Send + Sync {
    fn synthesize(&self, workspace: &Workspace) -> Result<String, PolicyError>;
}

/// Read-only catalog and bucket access scoped to a single workspace
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceReadPolicy;

impl PolicySynthesizer for WorkspaceReadPolicy {
    fn synthesize(&self, workspace: &Workspace) -> Result<String, PolicyError> {
        synthesize(workspace)
    }
}

pub fn synthesize(workspace: &Workspace) -> Result<String, PolicyError> {
    let workspace_arn = workspace.arn.trim();
    if workspace_arn.is_empty() {
        return Err(PolicyError::MissingWorkspaceArn);
    }
    let partition = arn_partition(workspace_arn)
        .ok_or_else(|| PolicyError::InvalidWorkspaceArn(workspace_arn.to_string()))?;

    let location = workspace
        .s3_location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(PolicyError::MissingS3Location)?;
    let bucket_arn = bucket_arn(location, partition)?;

    let document = json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Effect": "Allow",
                "Action": ["iottwinmaker:Get*", "iottwinmaker:List*"],
                "Resource": [workspace_arn, format!("{}/*", workspace_arn)]
            },
            {
                "Effect": "Allow",
                "Action": "iottwinmaker:ListWorkspaces",
                "Resource": "*"
            },
            {
                "Effect": "Allow",
                "Action": ["s3:GetObject"],
                "Resource": [bucket_arn.clone(), format!("{}/*", bucket_arn)]
            }
        ]
    });

    let policy =
        serde_json::to_string(&document).map_err(|e| PolicyError::Serialization(e.to_string()))?;
    if policy.len() > MAX_POLICY_LENGTH {
        return Err(PolicyError::TooLarge {
            length: policy.len(),
            limit: MAX_POLICY_LENGTH,
        });
    }
    Ok(policy)
}

/// Partition of a TwinMaker workspace ARN:
/// `arn:<partition>:iottwinmaker:<region>:<account>:workspace/<id>`
fn arn_partition(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    let (prefix, partition, service, region, account, resource) = (
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
    );
    let valid = prefix == "arn"
        && !partition.is_empty()
        && service == "iottwinmaker"
        && !region.is_empty()
        && !account.is_empty()
        && resource.starts_with("workspace/")
        && resource.len() > "workspace/".len();
    valid.then_some(partition)
}

/// Accepts `arn:<partition>:s3:::<bucket>` or a bare bucket name
fn bucket_arn(location: &str, partition: &str) -> Result<String, PolicyError> {
    let invalid = || PolicyError::InvalidS3Location(location.to_string());

    if location.starts_with("arn:") {
        let parts: Vec<&str> = location.splitn(6, ':').collect();
        return match parts.as_slice() {
            ["arn", p, "s3", "", "", bucket] if !p.is_empty() && is_bucket_name(bucket) => {
                Ok(location.to_string())
            }
            _ => Err(invalid()),
        };
    }

    if is_bucket_name(location) {
        Ok(format!("arn:{}:s3:::{}", partition, location))
    } else {
        Err(invalid())
    }
}

fn is_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}
