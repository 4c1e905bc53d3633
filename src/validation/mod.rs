mod column_order;
mod principals;
mod result;
mod update_policy;

pub use column_order::validate_column_order;
pub use principals::{PrincipalDirectory, PrincipalFinding, PrincipalInfo, PrincipalValidator};
pub use result::{QueryValidation, StructuralValidation};
pub use update_policy::UpdatePolicyValidator;
