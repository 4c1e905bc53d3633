use super::StructuralValidation;
use crate::dsl::{DatabaseState, Principal, PrincipalKind, Role};
use crate::error::Result;
use crate::script::CommentKind;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

const DEFAULT_PARALLELISM: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub display_name: String,
    pub kind: PrincipalKind,
}

/// Identity-provider lookup used to confirm that declared principals exist.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn lookup(&self, id: &str, kind: PrincipalKind) -> Result<Option<PrincipalInfo>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalFinding {
    pub role: Role,
    pub principal: Principal,
    pub validation: StructuralValidation,
}

pub struct PrincipalValidator<D: PrincipalDirectory> {
    directory: D,
    parallelism: usize,
}

impl<D: PrincipalDirectory> PrincipalValidator<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Looks up every role member of `state`; returns only the members that failed.
    pub async fn validate(&self, state: &DatabaseState) -> Vec<PrincipalFinding> {
        let members: Vec<(Role, &Principal)> = Role::ALL
            .iter()
            .flat_map(|role| state.principals(*role).iter().map(move |p| (*role, p)))
            .collect();
        let total = members.len();

        let mut results: Vec<_> = stream::iter(members.into_iter().enumerate())
            .map(|(idx, (role, principal))| async move {
                let validation = self.check(principal).await;
                (idx, role, principal, validation)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;
        results.sort_by_key(|(idx, ..)| *idx);

        let findings: Vec<PrincipalFinding> = results
            .into_iter()
            .filter(|(_, _, _, validation)| !validation.is_valid)
            .map(|(_, role, principal, validation)| PrincipalFinding {
                role,
                principal: principal.clone(),
                validation,
            })
            .collect();

        info!(
            database = %state.name,
            principals = total,
            findings = findings.len(),
            "Principal validation complete"
        );
        findings
    }

    async fn check(&self, principal: &Principal) -> StructuralValidation {
        let Some(kind) = principal.kind() else {
            return StructuralValidation::failure(
                format!(
                    "Principal '{}' must start with aadapp=, aaduser= or aadgroup=",
                    principal.id
                ),
                CommentKind::Caution,
            );
        };

        match self.directory.lookup(&principal.id, kind).await {
            Ok(None) => StructuralValidation::failure(
                format!("{} '{}' does not exist in the directory", kind, principal.id),
                CommentKind::Caution,
            ),
            Ok(Some(found)) if found.kind != kind => StructuralValidation::failure(
                format!(
                    "'{}' is declared as {} but the directory reports a {}",
                    principal.id, kind, found.kind
                ),
                CommentKind::Caution,
            ),
            Ok(Some(found)) => match &principal.name {
                Some(name) if *name != found.display_name => StructuralValidation::failure(
                    format!(
                        "'{}' is declared as '{}' but the directory calls it '{}'",
                        principal.id, name, found.display_name
                    ),
                    CommentKind::Note,
                ),
                _ => StructuralValidation::success(),
            },
            Err(e) => {
                warn!(principal = %principal.id, error = %e, "Principal lookup failed");
                StructuralValidation::failure(
                    format!("Could not verify '{}': {}", principal.id, e),
                    CommentKind::Warning,
                )
            }
        }
    }
}
