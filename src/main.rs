use dotenvy::dotenv;

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    dotenv().ok();
    env_logger::init();

    println!("🚀 UnitedCare API running");

    let _ = unitedcare_server::build().launch().await?;
    Ok(())
}
