// src/handlers/index.rs
use actix_web::{web, HttpResponse};

use crate::storage::memory::DirectoryStorage;
use crate::utils::RequestError;

pub async fn index(storage: web::Data<DirectoryStorage>) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(storage.summary()))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn summary_reflects_seed() {
        let state = testing::state();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/").peer_addr(testing::client()).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let records = state.storage.get_servers();
        assert_eq!(body["total_servers"], records.len());
        let votes: u64 = records.iter().map(|r| r.votes).sum();
        assert_eq!(body["total_votes"], votes);
    }
}
