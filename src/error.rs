use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("catalog operation failed")]
    Catalog,
    #[display("could not read page")]
    Media,
    #[display("could not write output")]
    Output,
    #[display("{_0} not found")]
    NotFound(#[error(not(source))] String),
}
