pub mod auth;
pub mod company;
pub mod persons;
pub mod time_records;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me))
        // Company
        .route(
            "/api/v1/company",
            get(company::get_company).put(company::update_company),
        )
        .route(
            "/api/v1/companies/{id}/persons",
            get(persons::list_by_company),
        )
        // Persons
        .route("/api/v1/persons", get(persons::list).post(persons::create))
        .route(
            "/api/v1/persons/{id}",
            get(persons::get)
                .put(persons::update)
                .delete(persons::delete),
        )
        // Time records
        .route(
            "/api/v1/time-records",
            get(time_records::list).post(time_records::create),
        )
        .route("/api/v1/time-records/own", get(time_records::list_own))
        .route("/api/v1/time-records/own/{id}", get(time_records::get_own))
        .route(
            "/api/v1/time-records/{id}",
            get(time_records::get)
                .put(time_records::update)
                .delete(time_records::delete),
        )
}
