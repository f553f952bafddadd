pub mod callback_auth;
