use axum::{
    Json,
    extract::{Query, State},
};
use scratch_app::{
    domain::{PaginatedResponse, Pagination},
    workflow::search::{SEARCH_RESULTS_PER_PAGE, SearchUseCaseError},
};
use serde::Serialize;

use crate::{
    AppState, ServiceError,
    extract::MaybeUser,
    forms::SearchQuery,
    page::{Page, render},
    session::Session,
    views::{GameCardView, Paginated},
};

#[derive(Serialize, Debug)]
pub struct SearchPage {
    query: String,
    results: Paginated<GameCardView>,
}

pub async fn search(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<SearchPage>>, ServiceError> {
    let q = query.q.unwrap_or_default();
    let pagination = Pagination::new(query.page.unwrap_or(1), SEARCH_RESULTS_PER_PAGE);
    let results = match app_state.app.search_use_case.search(&q, pagination).await {
        Ok(results) => results,
        Err(SearchUseCaseError::Unavailable) => {
            session.flash_error("Search is currently unavailable");
            PaginatedResponse::empty(pagination)
        }
        Err(SearchUseCaseError::Internal) => {
            return Err(ServiceError::Internal("Search failed".to_string()));
        }
    };

    let data = SearchPage {
        query: q,
        results: Paginated::from_response(results, GameCardView::from),
    };
    Ok(render(&session, user.as_ref(), data))
}
