//! Create a verified staff account, or promote an existing one.
//!
//! Usage: cargo run --bin create-staff <EMAIL> <USERNAME> <PASSWORD>

use std::{env, error::Error};

use portfolio_manager::{
    auth::password,
    config::Config,
    db::{self, models::NewUser},
    resources::fields::{is_valid_email, is_valid_username},
    routes::auth::MIN_PASSWORD_LENGTH,
    store::{PgStore, Store},
};

const STAFF_ROLE: &str = "staff";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let [email, username, plain] = args.as_slice() else {
        eprintln!("Usage: cargo run --bin create-staff <EMAIL> <USERNAME> <PASSWORD>");
        std::process::exit(1);
    };

    if let Err(e) = create_staff(&email.to_lowercase(), username, plain).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn create_staff(email: &str, username: &str, plain: &str) -> Result<(), Box<dyn Error>> {
    if !is_valid_email(email) {
        return Err(format!("'{}' is not a valid email address", email).into());
    }
    if !is_valid_username(username) {
        return Err(format!("'{}' is not a valid username", username).into());
    }
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("password must be at least {} characters", MIN_PASSWORD_LENGTH).into());
    }
    if env::var("DATABASE_URL").is_err() {
        return Err("DATABASE_URL must be set".into());
    }

    let config = Config::from_env();
    let pool = db::init_pool(None).await?;
    db::run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    let password_hash = password::hash_password(plain.to_string(), config.bcrypt_cost).await?;
    let staff_role = store.find_role_by_name(STAFF_ROLE).await?.map(|r| r.id);

    if let Some(mut user) = store.find_user_by_email(email).await? {
        user.is_staff = true;
        user.is_verified = true;
        user.password_hash = password_hash;
        user.otp_code = None;
        user.otp_expires_at = None;
        user.role_id = staff_role.or(user.role_id);
        let user = store.save_user(&user).await?;
        println!("\nPromoted {} ({}) to staff.", user.email, user.username);
        println!("User id  : {}\n", user.id);
        return Ok(());
    }

    let user = store
        .insert_user(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash,
            first_name: None,
            last_name: None,
            phone: None,
            role_id: staff_role,
            is_verified: true,
            is_staff: true,
            otp_code: None,
            otp_expires_at: None,
        })
        .await?;

    println!("\nCreated staff user {} ({}).", user.email, user.username);
    println!("User id  : {}\n", user.id);
    Ok(())
}
