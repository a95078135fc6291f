mod auth;
mod common;
mod history;
mod once;
mod root;
mod run;

pub(crate) use root::get_args;
