use crate::error::{AppError, AppResult};

pub fn hash_password(password: impl AsRef<[u8]>) -> AppResult<String> {
    let salt = password_hash::SaltString::generate(&mut rand::thread_rng());

    let hash =
        password_hash::PasswordHash::generate(argon2::Argon2::default(), password.as_ref(), &salt)
            .map_err(|err| anyhow::anyhow!(err))?
            .to_string();
    Ok(hash)
}

/// Fails with 400 when `password` does not match the stored PHC `hash`.
pub fn verify_password(password: impl AsRef<[u8]>, hash: &str, message: &'static str) -> AppResult<()> {
    let hash = password_hash::PasswordHash::new(hash).map_err(|err| anyhow::anyhow!(err))?;

    hash.verify_password(&[&argon2::Argon2::default()], password)
        .map_err(|err| {
            log::debug!("password mismatch: {:?}", err);
            AppError::bad_request(message)
        })
}
