pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Service(#[from] mx_service::Error),
	#[error(transparent)]
	Storage(#[from] mx_storage::Error),
}
