//! HTTP boundary for the TrustChain ledger.
//!
//! Exposes every facade operation over JSON. The ledger is a single
//! logical writer: mutating routes take the write half of one
//! `parking_lot::RwLock`, queries take the read half and observe a
//! consistent snapshot. Errors cross the wire as
//! `{ "error": <code>, "message": <text> }`; mapping that closed shape
//! onto anything richer is the client's concern.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use trustchain_ledger::{
    Address, EndorsementError, Loan, LedgerError, LoanError, PoolError, RegistryError, TrustLedger,
};
use warp::http::StatusCode;
use warp::{reply, Filter};

pub type SharedLedger = Arc<RwLock<TrustLedger>>;

pub fn new_shared(ledger: TrustLedger) -> SharedLedger {
    Arc::new(RwLock::new(ledger))
}

// ---- request bodies --------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    address: Address,
}

#[derive(Debug, Deserialize)]
struct EndorseRequest {
    endorser: Address,
    endorsee: Address,
    stake: u128,
}

#[derive(Debug, Deserialize)]
struct DepositRequest {
    from: Address,
    amount: u128,
}

#[derive(Debug, Deserialize)]
struct RequestLoanRequest {
    borrower: Address,
    amount: u128,
    collateral: u128,
}

#[derive(Debug, Deserialize)]
struct RepayRequest {
    payer: Address,
    loan_id: u64,
    amount: u128,
}

#[derive(Debug, Deserialize)]
struct SweepRequest {
    caller: Address,
    loan_id: u64,
}

// ---- response shapes -------------------------------------------------

/// Loan plus the numeric status code legacy clients decode.
#[derive(Debug, Serialize)]
struct LoanView {
    #[serde(flatten)]
    loan: Loan,
    status_code: u8,
}

impl From<Loan> for LoanView {
    fn from(loan: Loan) -> Self {
        let status_code = loan.status.code();
        LoanView { loan, status_code }
    }
}

#[derive(Debug, Serialize)]
struct LoanIdsResponse {
    address: Address,
    loan_ids: Vec<u64>,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    address: Address,
    balance: u128,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

type JsonReply = reply::WithStatus<reply::Json>;

fn error_code(err: &LedgerError) -> (&'static str, StatusCode) {
    match err {
        LedgerError::Registry(RegistryError::AlreadyRegistered(_)) => {
            ("AlreadyRegistered", StatusCode::CONFLICT)
        }
        LedgerError::Registry(RegistryError::NotRegistered(_)) => {
            ("NotRegistered", StatusCode::NOT_FOUND)
        }
        LedgerError::Endorsement(EndorsementError::SelfEndorsement) => {
            ("SelfEndorsement", StatusCode::BAD_REQUEST)
        }
        LedgerError::Endorsement(EndorsementError::InvalidStake) => {
            ("InvalidStake", StatusCode::BAD_REQUEST)
        }
        LedgerError::Endorsement(EndorsementError::CommissionOverflow) => {
            ("Internal", StatusCode::INTERNAL_SERVER_ERROR)
        }
        LedgerError::Pool(PoolError::InsufficientLiquidity { .. }) => {
            ("InsufficientLiquidity", StatusCode::CONFLICT)
        }
        LedgerError::Pool(PoolError::InvalidAmount) => ("InvalidAmount", StatusCode::BAD_REQUEST),
        LedgerError::Pool(_) => ("Internal", StatusCode::INTERNAL_SERVER_ERROR),
        LedgerError::Loan(LoanError::NotFound(_)) => ("NotFound", StatusCode::NOT_FOUND),
        LedgerError::Loan(LoanError::NotActive { .. }) => ("NotActive", StatusCode::CONFLICT),
        LedgerError::Loan(LoanError::InvalidAmount) => ("InvalidAmount", StatusCode::BAD_REQUEST),
        LedgerError::Loan(LoanError::TrustScoreTooLow { .. }) => {
            ("TrustScoreTooLow", StatusCode::FORBIDDEN)
        }
        LedgerError::Loan(LoanError::CollateralMismatch { .. }) => {
            ("CollateralMismatch", StatusCode::BAD_REQUEST)
        }
        LedgerError::Loan(LoanError::WrongRepaymentAmount { .. }) => {
            ("WrongRepaymentAmount", StatusCode::BAD_REQUEST)
        }
        LedgerError::Loan(LoanError::DeadlineNotReached { .. }) => {
            ("DeadlineNotReached", StatusCode::CONFLICT)
        }
        LedgerError::Loan(LoanError::InvalidTransition { .. }) => {
            ("Internal", StatusCode::INTERNAL_SERVER_ERROR)
        }
        LedgerError::Config(_) => ("InvalidConfig", StatusCode::BAD_REQUEST),
        LedgerError::Internal(_) => ("Internal", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn error_reply(err: &LedgerError) -> JsonReply {
    let (code, status) = error_code(err);
    reply::with_status(
        reply::json(&ErrorBody {
            error: code,
            message: err.to_string(),
        }),
        status,
    )
}

fn ok_reply<T: Serialize>(value: &T) -> JsonReply {
    reply::with_status(reply::json(value), StatusCode::OK)
}

// ---- routes ----------------------------------------------------------

pub fn routes(
    ledger: SharedLedger,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| reply::json(&"TrustChain RPC is running"));

    let register = {
        let ledger = ledger.clone();
        warp::path!("user" / "register")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: RegisterRequest| {
                let mut state = ledger.write();
                match state
                    .register(&req.address)
                    .and_then(|_| state.get_user(&req.address).cloned())
                {
                    Ok(account) => reply::with_status(reply::json(&account), StatusCode::CREATED),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let endorse = {
        let ledger = ledger.clone();
        warp::path!("endorse")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: EndorseRequest| {
                let mut state = ledger.write();
                match state
                    .endorse(&req.endorser, &req.endorsee, req.stake)
                    .and_then(|_| state.get_user(&req.endorsee).cloned())
                {
                    Ok(account) => ok_reply(&account),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let pool_deposit = {
        let ledger = ledger.clone();
        warp::path!("pool" / "deposit")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: DepositRequest| {
                let mut state = ledger.write();
                match state.deposit(&req.from, req.amount) {
                    Ok(()) => ok_reply(&state.pool_stats()),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let loan_request = {
        let ledger = ledger.clone();
        warp::path!("loan" / "request")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: RequestLoanRequest| {
                let mut state = ledger.write();
                match state
                    .request_loan(&req.borrower, req.amount, req.collateral)
                    .and_then(|loan_id| state.get_loan(loan_id).cloned())
                {
                    Ok(loan) => {
                        reply::with_status(reply::json(&LoanView::from(loan)), StatusCode::CREATED)
                    }
                    Err(err) => error_reply(&err),
                }
            })
    };

    let loan_repay = {
        let ledger = ledger.clone();
        warp::path!("loan" / "repay")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: RepayRequest| {
                let mut state = ledger.write();
                match state
                    .repay(&req.payer, req.loan_id, req.amount)
                    .and_then(|_| state.get_loan(req.loan_id).cloned())
                {
                    Ok(loan) => ok_reply(&LoanView::from(loan)),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let loan_sweep = {
        let ledger = ledger.clone();
        warp::path!("loan" / "sweep")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |req: SweepRequest| {
                let mut state = ledger.write();
                match state
                    .default_sweep(&req.caller, req.loan_id)
                    .and_then(|_| state.get_loan(req.loan_id).cloned())
                {
                    Ok(loan) => ok_reply(&LoanView::from(loan)),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let get_user = {
        let ledger = ledger.clone();
        warp::path!("user" / String)
            .and(warp::get())
            .map(move |address: String| {
                let state = ledger.read();
                match state.get_user(&Address::from(address)) {
                    Ok(account) => ok_reply(account),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let get_user_loans = {
        let ledger = ledger.clone();
        warp::path!("user" / String / "loans")
            .and(warp::get())
            .map(move |address: String| {
                let state = ledger.read();
                let address = Address::from(address);
                let loan_ids = state.get_active_loans_for_user(&address);
                ok_reply(&LoanIdsResponse { address, loan_ids })
            })
    };

    let get_loan = {
        let ledger = ledger.clone();
        warp::path!("loan" / u64)
            .and(warp::get())
            .map(move |loan_id: u64| {
                let state = ledger.read();
                match state.get_loan(loan_id) {
                    Ok(loan) => ok_reply(&LoanView::from(loan.clone())),
                    Err(err) => error_reply(&err),
                }
            })
    };

    let get_pool = {
        let ledger = ledger.clone();
        warp::path!("pool")
            .and(warp::get())
            .map(move || {
                let state = ledger.read();
                ok_reply(&state.pool_stats())
            })
    };

    let get_balance = {
        let ledger = ledger.clone();
        warp::path!("balance" / String)
            .and(warp::get())
            .map(move |address: String| {
                let state = ledger.read();
                let address = Address::from(address);
                let balance = state.balance_of(&address);
                ok_reply(&BalanceResponse { address, balance })
            })
    };

    let get_events = {
        let ledger = ledger.clone();
        warp::path!("events")
            .and(warp::get())
            .map(move || {
                let state = ledger.read();
                ok_reply(&state.events().to_vec())
            })
    };

    health
        .or(register)
        .or(endorse)
        .or(pool_deposit)
        .or(loan_request)
        .or(loan_repay)
        .or(loan_sweep)
        .or(get_user_loans)
        .or(get_user)
        .or(get_loan)
        .or(get_pool)
        .or(get_balance)
        .or(get_events)
}

/// Serve the API until the process exits.
pub async fn serve(addr: SocketAddr, ledger: SharedLedger) {
    info!("TrustChain RPC listening on {}", addr);
    warp::serve(routes(ledger)).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustchain_ledger::LedgerConfig;

    fn shared() -> SharedLedger {
        new_shared(TrustLedger::with_defaults())
    }

    #[tokio::test]
    async fn test_health() {
        let api = routes(shared());
        let response = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_then_fetch_user() {
        let api = routes(shared());

        let response = warp::test::request()
            .method("POST")
            .path("/user/register")
            .json(&serde_json::json!({ "address": "0xabc" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = warp::test::request().path("/user/0xabc").reply(&api).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["trust_score"], 400);
        assert_eq!(body["is_registered"], true);
    }

    #[tokio::test]
    async fn test_unregistered_user_is_not_found() {
        let api = routes(shared());
        let response = warp::test::request().path("/user/0xnobody").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "NotRegistered");
    }

    #[tokio::test]
    async fn test_double_register_conflicts() {
        let api = routes(shared());
        let request = || {
            warp::test::request()
                .method("POST")
                .path("/user/register")
                .json(&serde_json::json!({ "address": "0xabc" }))
        };
        request().reply(&api).await;
        let response = request().reply(&api).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "AlreadyRegistered");
    }

    #[tokio::test]
    async fn test_loan_request_and_numeric_status() {
        let ledger = new_shared(
            TrustLedger::new(LedgerConfig {
                initial_trust_score: 500,
                ..LedgerConfig::default()
            })
            .unwrap(),
        );
        let api = routes(ledger);

        warp::test::request()
            .method("POST")
            .path("/user/register")
            .json(&serde_json::json!({ "address": "0xbob" }))
            .reply(&api)
            .await;
        warp::test::request()
            .method("POST")
            .path("/pool/deposit")
            .json(&serde_json::json!({ "from": "0xwhale", "amount": 100_000u64 }))
            .reply(&api)
            .await;

        let response = warp::test::request()
            .method("POST")
            .path("/loan/request")
            .json(&serde_json::json!({
                "borrower": "0xbob",
                "amount": 10_000u64,
                "collateral": 13_000u64
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "Active");
        assert_eq!(body["status_code"], 1);
        assert_eq!(body["repayment_amount"], 10_700);

        let response = warp::test::request()
            .path("/user/0xbob/loans")
            .reply(&api)
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["loan_ids"], serde_json::json!([1]));
    }

    #[tokio::test]
    async fn test_trust_score_too_low_is_forbidden() {
        let api = routes(shared());

        warp::test::request()
            .method("POST")
            .path("/user/register")
            .json(&serde_json::json!({ "address": "0xbob" }))
            .reply(&api)
            .await;

        let response = warp::test::request()
            .method("POST")
            .path("/loan/request")
            .json(&serde_json::json!({
                "borrower": "0xbob",
                "amount": 10_000u64,
                "collateral": 13_000u64
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "TrustScoreTooLow");
    }
}
