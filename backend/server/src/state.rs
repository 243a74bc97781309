use std::sync::Arc;

use crate::{
    auth::{CredentialStore, StaticCredentials, TokenSigner},
    config::Config,
    database::NoteStore,
    service::NoteService,
    storage::FileStorage,
};

pub struct AppState<N> {
    pub config: Config,
    pub notes: NoteService<N>,
    pub tokens: TokenSigner,
    pub credentials: Arc<dyn CredentialStore>,
}

impl<N: NoteStore> AppState<N> {
    pub async fn new(config: Config, store: N) -> std::io::Result<Arc<Self>> {
        let files = FileStorage::open(&config.upload_dir).await?;
        let credentials = Arc::new(StaticCredentials::new(
            config.admin_username.clone(),
            config.admin_password.clone(),
        ));

        Ok(Self::with_credentials(config, store, files, credentials))
    }

    pub fn with_credentials(
        config: Config,
        store: N,
        files: FileStorage,
        credentials: Arc<dyn CredentialStore>,
    ) -> Arc<Self> {
        let tokens = TokenSigner::new(&config.jwt_secret, config.token_ttl_secs);
        let notes = NoteService::new(store, files, config.max_upload_bytes);

        Arc::new(Self {
            config,
            notes,
            tokens,
            credentials,
        })
    }
}
