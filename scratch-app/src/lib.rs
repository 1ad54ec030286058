use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        comment::CommentRepository,
        game::GameRepository,
        media::MediaRepository,
        tag::TagRepository,
        task::TaskRepository,
        two_factor::TotpTwoFactorService,
        user::{BcryptPasswordHasher, UserRepository},
    },
    ports::{email::EmailPort, search::SearchIndexPort, storage::ObjectStoragePort},
    processes::{
        export_data::ExportDataJob,
        job_queue::{JobRunner, TokioJobQueue},
    },
    workflow::{
        account::{
            change_password::{ChangePasswordUseCase, ChangePasswordUseCaseImpl},
            export_data::{ExportDataUseCase, ExportDataUseCaseImpl},
            login::{LoginUseCase, LoginUseCaseImpl},
            profile::{ProfileUseCase, ProfileUseCaseImpl},
            register::{RegisterUseCase, RegisterUseCaseImpl},
            reset_password::{ResetPasswordUseCase, ResetPasswordUseCaseImpl},
            settings::{SettingsUseCase, SettingsUseCaseImpl},
            two_factor::{TwoFactorUseCase, TwoFactorUseCaseImpl},
            verify_totp::{VerifyTotpUseCase, VerifyTotpUseCaseImpl},
        },
        comment::{CommentUseCase, CommentUseCaseImpl},
        game::{
            create::{CreateGameUseCase, CreateGameUseCaseImpl},
            delete::{DeleteGameUseCase, DeleteGameUseCaseImpl},
            edit::{EditGameUseCase, EditGameUseCaseImpl},
            get::{GetGameUseCase, GetGameUseCaseImpl},
            list::{ListGamesUseCase, ListGamesUseCaseImpl},
        },
        search::{SearchUseCase, SearchUseCaseImpl},
    },
};

pub mod domain;
pub mod ports;
pub mod processes;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[derive(Clone, Debug)]
pub struct AppSettings {
    /// Absolute URL of the site, used for links in emails.
    pub base_url: String,
    pub secret_key: String,
    pub totp_issuer: String,
    pub bcrypt_cost: u32,
}

pub struct Application {
    pub register_use_case: Box<dyn RegisterUseCase + Send + Sync + 'static>,
    pub login_use_case: Box<dyn LoginUseCase + Send + Sync + 'static>,
    pub verify_totp_use_case: Box<dyn VerifyTotpUseCase + Send + Sync + 'static>,
    pub settings_use_case: Box<dyn SettingsUseCase + Send + Sync + 'static>,
    pub change_password_use_case: Box<dyn ChangePasswordUseCase + Send + Sync + 'static>,
    pub two_factor_use_case: Box<dyn TwoFactorUseCase + Send + Sync + 'static>,
    pub reset_password_use_case: Box<dyn ResetPasswordUseCase + Send + Sync + 'static>,
    pub profile_use_case: Box<dyn ProfileUseCase + Send + Sync + 'static>,
    pub export_data_use_case: Box<dyn ExportDataUseCase + Send + Sync + 'static>,

    pub game_create_use_case: Box<dyn CreateGameUseCase + Send + Sync + 'static>,
    pub game_edit_use_case: Box<dyn EditGameUseCase + Send + Sync + 'static>,
    pub game_delete_use_case: Box<dyn DeleteGameUseCase + Send + Sync + 'static>,
    pub game_get_use_case: Box<dyn GetGameUseCase + Send + Sync + 'static>,
    pub game_list_use_case: Box<dyn ListGamesUseCase + Send + Sync + 'static>,

    pub comment_use_case: Box<dyn CommentUseCase + Send + Sync + 'static>,
    pub search_use_case: Box<dyn SearchUseCase + Send + Sync + 'static>,
}

/// Wires the use cases to the given adapters and starts the job runner, which
/// stops when `shutdown` is cancelled. The returned handle finishes with it.
pub fn build_application<
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    T: TagRepository + Send + Sync + 'static,
    C: CommentRepository + Send + Sync + 'static,
    K: TaskRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
    X: SearchIndexPort + Send + Sync + 'static,
    E: EmailPort + Send + Sync + 'static,
>(
    settings: &AppSettings,
    user_repository: Arc<U>,
    game_repository: Arc<G>,
    media_repository: Arc<M>,
    tag_repository: Arc<T>,
    comment_repository: Arc<C>,
    task_repository: Arc<K>,
    storage: Arc<S>,
    search: Arc<X>,
    email_port: Arc<E>,
    shutdown: CancellationToken,
) -> (Application, JoinHandle<()>) {
    let password_hasher = Arc::new(BcryptPasswordHasher::new(settings.bcrypt_cost));
    let two_factor_service = Arc::new(TotpTwoFactorService::new(&settings.totp_issuer));

    let (job_queue, job_receiver) = TokioJobQueue::channel();
    let job_queue = Arc::new(job_queue);
    let export_data_job = Arc::new(ExportDataJob::new(
        email_port.clone(),
        user_repository.clone(),
        game_repository.clone(),
        comment_repository.clone(),
        task_repository.clone(),
    ));
    let jobs = tokio::spawn(JobRunner::new(job_receiver, export_data_job, shutdown).run());

    let app = Application {
        register_use_case: Box::new(RegisterUseCaseImpl::new(
            user_repository.clone(),
            password_hasher.clone(),
        )),
        login_use_case: Box::new(LoginUseCaseImpl::new(
            user_repository.clone(),
            password_hasher.clone(),
        )),
        verify_totp_use_case: Box::new(VerifyTotpUseCaseImpl::new(
            user_repository.clone(),
            two_factor_service.clone(),
        )),
        settings_use_case: Box::new(SettingsUseCaseImpl::new(user_repository.clone())),
        change_password_use_case: Box::new(ChangePasswordUseCaseImpl::new(
            user_repository.clone(),
            password_hasher.clone(),
        )),
        two_factor_use_case: Box::new(TwoFactorUseCaseImpl::new(
            user_repository.clone(),
            two_factor_service.clone(),
        )),
        reset_password_use_case: Box::new(ResetPasswordUseCaseImpl::new(
            user_repository.clone(),
            password_hasher.clone(),
            email_port.clone(),
            &settings.secret_key,
            &settings.base_url,
        )),
        profile_use_case: Box::new(ProfileUseCaseImpl::new(
            user_repository.clone(),
            game_repository.clone(),
        )),
        export_data_use_case: Box::new(ExportDataUseCaseImpl::new(
            task_repository.clone(),
            job_queue.clone(),
        )),

        game_create_use_case: Box::new(CreateGameUseCaseImpl::new(
            game_repository.clone(),
            media_repository.clone(),
            tag_repository.clone(),
            storage.clone(),
            search.clone(),
        )),
        game_edit_use_case: Box::new(EditGameUseCaseImpl::new(
            game_repository.clone(),
            media_repository.clone(),
            tag_repository.clone(),
            storage.clone(),
            search.clone(),
        )),
        game_delete_use_case: Box::new(DeleteGameUseCaseImpl::new(
            game_repository.clone(),
            media_repository.clone(),
            storage.clone(),
            search.clone(),
        )),
        game_get_use_case: Box::new(GetGameUseCaseImpl::new(
            game_repository.clone(),
            user_repository.clone(),
            media_repository.clone(),
            tag_repository.clone(),
            comment_repository.clone(),
            storage.clone(),
        )),
        game_list_use_case: Box::new(ListGamesUseCaseImpl::new(
            game_repository.clone(),
            storage.clone(),
        )),

        comment_use_case: Box::new(CommentUseCaseImpl::new(
            comment_repository.clone(),
            game_repository.clone(),
        )),
        search_use_case: Box::new(SearchUseCaseImpl::new(search, game_repository, storage)),
    };
    (app, jobs)
}
