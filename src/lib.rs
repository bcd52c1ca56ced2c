pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::database::{AttemptStore, QuestionBank};
use crate::middleware::auth::AuthKeys;
use crate::services::{
    attempt_grader::AttemptGrader, attempt_ledger::AttemptLedger, course_access::CourseAccess,
    test_service::TestService,
};
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct AppState {
    pub test_service: TestService,
    pub ledger: AttemptLedger,
    pub grader: AttemptGrader,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthKeys,
}

impl AppState {
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn AttemptStore>,
        access: Arc<dyn CourseAccess>,
        clock: Arc<dyn Clock>,
        jwt_secret: &str,
    ) -> Self {
        let test_service = TestService::new(bank, access);
        let ledger = AttemptLedger::new(test_service.clone(), store.clone(), clock.clone());
        let grader = AttemptGrader::new(
            test_service.clone(),
            ledger.clone(),
            store,
            clock.clone(),
        );

        Self {
            test_service,
            ledger,
            grader,
            clock,
            auth: AuthKeys::new(jwt_secret),
        }
    }
}
