#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod guards;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};

use services::RateLimiter;

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(429)]
fn too_many_requests() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Too many requests. Please try later."
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- BUILD ----------------------------- */

pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .manage(RateLimiter::new())
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            routes![
                // Auth
                routes::auth::register,
                routes::auth::verify_otp,
                routes::auth::login,
                routes::auth::forgot_password,
                routes::auth::reset_password,
                routes::auth::refresh_token,
                // KYC
                routes::kyc::submit_kyc,
                routes::kyc::get_kyc_status,
            ],
        )
        .register("/", catchers![not_found, too_many_requests, internal_error])
}
