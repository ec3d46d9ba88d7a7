use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Resource, Role};
use crate::database::DatabaseError;

/// Row-level visibility for one request.
///
/// Resolved once per request from the caller's identity; [`where_for`] then
/// yields the filter condition to AND onto every query against a resource.
///
/// [`where_for`]: AccessScope::where_for
#[derive(Debug, Clone, PartialEq)]
pub enum AccessScope {
    /// Admin and staff see every row
    Unrestricted,
    /// Lawyers see the cases assigned to them and what hangs off those cases
    Lawyer {
        user_id: Uuid,
        case_ids: Vec<Uuid>,
        client_ids: Vec<Uuid>,
    },
    /// Portal clients see their own client records and everything under them
    Client {
        user_id: Uuid,
        client_ids: Vec<Uuid>,
        case_ids: Vec<Uuid>,
    },
}

impl AccessScope {
    pub async fn resolve(pool: &PgPool, user_id: Uuid, role: Role) -> Result<Self, DatabaseError> {
        match role {
            Role::Admin | Role::Staff => Ok(AccessScope::Unrestricted),
            Role::Lawyer => {
                let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
                    "SELECT id, client_id FROM cases WHERE lawyer_id = $1 AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?;

                let case_ids = rows.iter().map(|(id, _)| *id).collect();
                let mut client_ids: Vec<Uuid> = rows.iter().map(|(_, client_id)| *client_id).collect();
                client_ids.sort();
                client_ids.dedup();

                Ok(AccessScope::Lawyer { user_id, case_ids, client_ids })
            }
            Role::Client => {
                let client_ids: Vec<Uuid> = sqlx::query_scalar(
                    "SELECT id FROM clients WHERE user_id = $1 AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?;

                let case_ids: Vec<Uuid> = if client_ids.is_empty() {
                    vec![]
                } else {
                    sqlx::query_scalar("SELECT id FROM cases WHERE client_id = ANY($1) AND deleted_at IS NULL")
                        .bind(&client_ids)
                        .fetch_all(pool)
                        .await?
                };

                Ok(AccessScope::Client { user_id, client_ids, case_ids })
            }
        }
    }

    /// Filter condition restricting `resource` to visible rows; None means unrestricted
    pub fn where_for(&self, resource: Resource) -> Option<Value> {
        match self {
            AccessScope::Unrestricted => None,
            AccessScope::Lawyer { user_id, case_ids, client_ids } => Some(match resource {
                Resource::Users => json!({ "id": user_id }),
                Resource::Cases => json!({ "lawyer_id": user_id }),
                Resource::Clients => json!({
                    "$or": [
                        { "id": { "$in": client_ids } },
                        { "created_by": user_id }
                    ]
                }),
                Resource::Hearings | Resource::Documents => json!({ "case_id": { "$in": case_ids } }),
                Resource::Invoices => json!({
                    "$or": [
                        { "case_id": { "$in": case_ids } },
                        { "client_id": { "$in": client_ids } },
                        { "created_by": user_id }
                    ]
                }),
            }),
            AccessScope::Client { user_id, client_ids, case_ids } => Some(match resource {
                Resource::Users => json!({ "id": user_id }),
                Resource::Clients => json!({ "user_id": user_id }),
                Resource::Cases => json!({ "client_id": { "$in": client_ids } }),
                Resource::Hearings | Resource::Documents => json!({ "case_id": { "$in": case_ids } }),
                Resource::Invoices => json!({
                    "client_id": { "$in": client_ids },
                    "status": { "$ne": "draft" }
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;
    use crate::filter::FilterWhereOptions;

    fn lawyer() -> (Uuid, AccessScope) {
        let user_id = Uuid::new_v4();
        let scope = AccessScope::Lawyer {
            user_id,
            case_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            client_ids: vec![Uuid::new_v4()],
        };
        (user_id, scope)
    }

    fn compile(condition: &Value) -> (String, Vec<Value>) {
        FilterWhere::generate(condition, None, &FilterWhereOptions::default()).unwrap()
    }

    #[test]
    fn unrestricted_scope_adds_nothing() {
        for resource in [Resource::Cases, Resource::Invoices, Resource::Users] {
            assert!(AccessScope::Unrestricted.where_for(resource).is_none());
        }
    }

    #[test]
    fn lawyer_sees_assigned_cases() {
        let (user_id, scope) = lawyer();
        let condition = scope.where_for(Resource::Cases).unwrap();
        let (sql, params) = compile(&condition);
        assert!(sql.ends_with("\"lawyer_id\" = $1"));
        assert_eq!(params, vec![json!(user_id)]);
    }

    #[test]
    fn lawyer_hearings_follow_case_ids() {
        let (_, scope) = lawyer();
        let (sql, params) = compile(&scope.where_for(Resource::Hearings).unwrap());
        assert!(sql.ends_with("\"case_id\" IN ($1, $2)"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn lawyer_clients_include_created_by() {
        let (user_id, scope) = lawyer();
        let (sql, params) = compile(&scope.where_for(Resource::Clients).unwrap());
        assert!(sql.contains("(\"id\" IN ($1)) OR (\"created_by\" = $2)"));
        assert_eq!(params[1], json!(user_id));
    }

    #[test]
    fn client_without_records_sees_nothing() {
        let scope = AccessScope::Client {
            user_id: Uuid::new_v4(),
            client_ids: vec![],
            case_ids: vec![],
        };
        let (sql, params) = compile(&scope.where_for(Resource::Cases).unwrap());
        assert!(sql.ends_with("1=0"));
        assert!(params.is_empty());
        let (sql, _) = compile(&scope.where_for(Resource::Documents).unwrap());
        assert!(sql.ends_with("1=0"));
    }

    #[test]
    fn client_never_sees_draft_invoices() {
        let scope = AccessScope::Client {
            user_id: Uuid::new_v4(),
            client_ids: vec![Uuid::new_v4()],
            case_ids: vec![],
        };
        let (sql, params) = compile(&scope.where_for(Resource::Invoices).unwrap());
        assert!(sql.contains("\"client_id\" IN ($1)"));
        assert!(sql.contains("\"status\" <> $2"));
        assert_eq!(params[1], json!("draft"));
    }

    #[test]
    fn client_sees_own_client_record() {
        let user_id = Uuid::new_v4();
        let scope = AccessScope::Client { user_id, client_ids: vec![], case_ids: vec![] };
        assert_eq!(scope.where_for(Resource::Clients), Some(json!({ "user_id": user_id })));
    }
}
