//! Tests against a real Postgres. They run only when DATABASE_URL is set and
//! pass trivially otherwise.

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use lexcase_api::access::{AccessScope, Role};
use lexcase_api::database::models::{Case, Client, ClientType, InvoiceItem, InvoiceStatus, User};
use lexcase_api::database::{next_number, NumberKind};
use lexcase_api::middleware::CurrentUser;
use lexcase_api::services::case_service::{CaseService, CreateCase};
use lexcase_api::services::client_service::{ClientService, CreateClient};
use lexcase_api::services::hearing_service::{AdjournHearing, CreateHearing, HearingService};
use lexcase_api::services::invoice_service::{CreateInvoice, InvoiceListQuery, InvoiceService};
use lexcase_api::services::user_service::{CreateUser, UserService};

async fn database() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(10).connect(&url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

/// A year no other test allocates in, so counters start from scratch
fn scratch_year() -> NaiveDate {
    let year = 3000 + (Uuid::new_v4().as_u128() % 5000) as i32;
    NaiveDate::from_ymd_opt(year, 6, 1).unwrap_or(NaiveDate::MAX)
}

fn counter(number: &str) -> u32 {
    number.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

async fn user(pool: &PgPool, role: Role) -> Result<User> {
    let user = UserService::new(pool.clone())
        .insert(CreateUser {
            name: format!("Test {}", role),
            email: format!("{}-{}@lexcase.test", role, Uuid::new_v4()),
            password: "Correct-Horse-9".to_string(),
            role,
            phone: None,
        })
        .await?;
    Ok(user)
}

async fn actor(pool: &PgPool, user: &User) -> Result<CurrentUser> {
    let role = user.role()?;
    Ok(CurrentUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role,
        scope: AccessScope::resolve(pool, user.id, role).await?,
    })
}

/// Admin, a portal client, one client record linked to the portal account and
/// one case assigned to `lawyer`
struct Firm {
    admin: CurrentUser,
    portal: User,
    client: Client,
    case: Case,
}

async fn firm(pool: &PgPool, lawyer: &User) -> Result<Firm> {
    let admin = actor(pool, &user(pool, Role::Admin).await?).await?;
    let portal = user(pool, Role::Client).await?;

    let client = ClientService::new(pool.clone())
        .create(
            &admin,
            CreateClient {
                client_type: ClientType::Individual,
                name: "Asha Verma".to_string(),
                company_name: None,
                email: None,
                phone: None,
                address: None,
                notes: None,
                user_id: Some(portal.id),
            },
        )
        .await?;

    let case = CaseService::new(pool.clone())
        .create(
            &admin,
            CreateCase {
                title: "Verma v. Municipal Corporation".to_string(),
                client_id: client.id,
                description: None,
                case_type: Some("civil".to_string()),
                priority: None,
                court_name: Some("District Court".to_string()),
                judge_name: None,
                opposing_party: None,
                filing_date: None,
                lawyer_id: Some(lawyer.id),
            },
        )
        .await?;

    Ok(Firm { admin, portal, client, case })
}

fn invoice_for(client_id: Uuid) -> CreateInvoice {
    CreateInvoice {
        client_id,
        case_id: None,
        issue_date: None,
        due_date: None,
        items: vec![InvoiceItem {
            description: "Consultation".to_string(),
            quantity: Decimal::new(2, 0),
            unit_price: Decimal::new(150000, 2),
            amount: Decimal::ZERO,
        }],
        tax_rate: Some(Decimal::new(18, 0)),
        notes: None,
    }
}

#[tokio::test]
async fn concurrent_allocations_get_distinct_consecutive_numbers() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let on = scratch_year();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut tx = pool.begin().await?;
            let number = next_number(&mut tx, NumberKind::Invoice, on).await?;
            tx.commit().await?;
            anyhow::Ok(number)
        }));
    }

    let mut counters = Vec::new();
    for task in tasks {
        counters.push(counter(&task.await??));
    }
    counters.sort_unstable();
    counters.dedup();

    assert_eq!(counters.len(), 8, "duplicate numbers: {:?}", counters);
    assert_eq!(counters[7] - counters[0], 7, "gap in numbers: {:?}", counters);
    Ok(())
}

#[tokio::test]
async fn rolled_back_allocation_is_reused() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let on = scratch_year();

    let mut tx = pool.begin().await?;
    let abandoned = next_number(&mut tx, NumberKind::Case, on).await?;
    tx.rollback().await?;

    let mut tx = pool.begin().await?;
    let kept = next_number(&mut tx, NumberKind::Case, on).await?;
    tx.commit().await?;

    assert_eq!(abandoned, kept);
    Ok(())
}

#[tokio::test]
async fn lawyers_only_reach_their_own_cases() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let assigned = user(&pool, Role::Lawyer).await?;
    let firm = firm(&pool, &assigned).await?;
    let cases = CaseService::new(pool.clone());

    let owner = actor(&pool, &assigned).await?;
    assert_eq!(cases.get(&owner, firm.case.id).await?.id, firm.case.id);

    let outsider = actor(&pool, &user(&pool, Role::Lawyer).await?).await?;
    let err = cases.get(&outsider, firm.case.id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = ClientService::new(pool.clone()).get(&outsider, firm.client.id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    Ok(())
}

#[tokio::test]
async fn portal_clients_never_see_drafts() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let lawyer = user(&pool, Role::Lawyer).await?;
    let firm = firm(&pool, &lawyer).await?;
    let invoices = InvoiceService::new(pool.clone());

    let draft = invoices.create(&firm.admin, invoice_for(firm.client.id)).await?;
    let sent = invoices.create(&firm.admin, invoice_for(firm.client.id)).await?;
    let sent = invoices.change_status(&firm.admin, sent.id, InvoiceStatus::Sent).await?;
    assert_eq!(sent.total, Decimal::new(354000, 2));

    let portal = actor(&pool, &firm.portal).await?;
    let visible = invoices
        .list(
            &portal,
            InvoiceListQuery {
                client_id: Some(firm.client.id),
                ..Default::default()
            },
        )
        .await?;
    let ids: Vec<Uuid> = visible.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![sent.id]);

    let err = invoices.get(&portal, draft.id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    Ok(())
}

#[tokio::test]
async fn clients_with_cases_cannot_be_deleted() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let lawyer = user(&pool, Role::Lawyer).await?;
    let firm = firm(&pool, &lawyer).await?;
    let clients = ClientService::new(pool.clone());

    let err = clients.delete(&firm.admin, firm.client.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    CaseService::new(pool.clone()).delete(&firm.admin, firm.case.id).await?;
    clients.delete(&firm.admin, firm.client.id).await?;
    assert_eq!(clients.get(&firm.admin, firm.client.id).await.unwrap_err().status_code(), 404);
    Ok(())
}

#[tokio::test]
async fn adjourning_schedules_the_next_hearing() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let lawyer = user(&pool, Role::Lawyer).await?;
    let firm = firm(&pool, &lawyer).await?;
    let hearings = HearingService::new(pool.clone());
    let first_date = Utc::now() + Duration::days(3);

    let hearing = hearings
        .create(
            &firm.admin,
            CreateHearing {
                case_id: firm.case.id,
                hearing_date: first_date,
                court_name: Some("District Court".to_string()),
                courtroom: Some("4B".to_string()),
                judge_name: None,
                purpose: Some("Framing of issues".to_string()),
                notes: None,
            },
        )
        .await?;

    let next_date = first_date + Duration::days(14);
    let adjourned = hearings
        .adjourn(
            &firm.admin,
            hearing.id,
            AdjournHearing {
                next_date,
                reason: Some("Counsel unavailable".to_string()),
            },
        )
        .await?;
    assert_eq!(adjourned.adjourned.status, "adjourned");
    assert_eq!(adjourned.next_hearing.status, "scheduled");
    assert_eq!(adjourned.next_hearing.case_id, firm.case.id);
    assert_eq!(adjourned.next_hearing.courtroom.as_deref(), Some("4B"));

    // A second adjournment of the same hearing is refused and adds nothing
    let again = AdjournHearing { next_date: next_date + Duration::days(7), reason: None };
    assert!(hearings.adjourn(&firm.admin, hearing.id, again).await.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hearings WHERE case_id = $1 AND deleted_at IS NULL")
        .bind(firm.case.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 2);
    Ok(())
}

#[tokio::test]
async fn deleted_accounts_release_their_email() -> Result<()> {
    let Some(pool) = database().await? else { return Ok(()) };
    let users = UserService::new(pool.clone());
    let admin = actor(&pool, &user(&pool, Role::Admin).await?).await?;
    let email = format!("reused-{}@lexcase.test", Uuid::new_v4());

    let account = || CreateUser {
        name: "Rahul Iyer".to_string(),
        email: email.clone(),
        password: "Correct-Horse-9".to_string(),
        role: Role::Staff,
        phone: None,
    };

    let first = users.insert(account()).await?;
    assert_eq!(users.insert(account()).await.unwrap_err().status_code(), 409);

    users.delete(&admin, first.id).await?;
    let second = users.insert(account()).await?;
    assert_ne!(first.id, second.id);
    Ok(())
}
