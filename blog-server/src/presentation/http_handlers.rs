use crate::application::{AuthService, BlogService, CommentService, PostFilter, SyncService};
use crate::domain::{CreatePostRequest, DomainError, LikeAction, NewComment, UpdatePostRequest};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

// Ответ с токеном
#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
pub struct CommentLikeRequest {
    pub action: LikeAction,
}

#[derive(Serialize)]
struct LikesResponse<T: Serialize> {
    likes: i64,
    persistence: T,
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

// Преобразование DomainError в HttpResponse
fn error_to_response(err: DomainError) -> HttpResponse {
    let status_code = err.to_status_code();
    let message = err.to_string();

    match status_code {
        400 => HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
        401 => HttpResponse::Unauthorized().json(serde_json::json!({ "error": message })),
        404 => HttpResponse::NotFound().json(serde_json::json!({ "error": message })),
        409 => HttpResponse::Conflict().json(serde_json::json!({ "error": message })),
        503 => HttpResponse::ServiceUnavailable().json(serde_json::json!({ "error": message })),
        _ => {
            tracing::error!("Request failed: {}", message);
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal server error" }))
        }
    }
}

// ============== Auth Handlers ==============

pub async fn login(
    auth_service: web::Data<Arc<AuthService>>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    match auth_service.login(&req.password) {
        Ok(token) => HttpResponse::Ok().json(TokenResponse { token }),
        Err(err) => error_to_response(err),
    }
}

// ============== Public Post Handlers ==============

pub async fn list_posts(
    blog_service: web::Data<Arc<BlogService>>,
    query: web::Query<PostFilter>,
) -> impl Responder {
    HttpResponse::Ok().json(blog_service.list_public(&query).await)
}

pub async fn get_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<String>,
) -> impl Responder {
    let url_id = path.into_inner();

    tracing::info!("Getting post with url_id={}", url_id);

    match blog_service.record_view(&url_id).await {
        Ok(persisted) => HttpResponse::Ok().json(persisted.into_value()),
        Err(err) => error_to_response(err),
    }
}

pub async fn like_post(
    req: HttpRequest,
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let post_id = path.into_inner();

    match blog_service.like_post(post_id, &client_ip(&req)).await {
        Ok(persisted) => HttpResponse::Ok().json(LikesResponse {
            likes: persisted.value,
            persistence: persisted.persistence,
        }),
        Err(err) => error_to_response(err),
    }
}

pub async fn list_categories(blog_service: web::Data<Arc<BlogService>>) -> impl Responder {
    HttpResponse::Ok().json(blog_service.categories().await)
}

pub async fn list_tags(blog_service: web::Data<Arc<BlogService>>) -> impl Responder {
    HttpResponse::Ok().json(blog_service.tags().await)
}

pub async fn list_history(blog_service: web::Data<Arc<BlogService>>) -> impl Responder {
    HttpResponse::Ok().json(blog_service.history().await)
}

// ============== Comment Handlers ==============

pub async fn list_comments(
    comment_service: web::Data<Arc<CommentService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match comment_service.list(path.into_inner()).await {
        Ok(comments) => HttpResponse::Ok().json(comments),
        Err(err) => error_to_response(err),
    }
}

pub async fn add_comment(
    comment_service: web::Data<Arc<CommentService>>,
    path: web::Path<i64>,
    comment: web::Json<NewComment>,
) -> impl Responder {
    match comment_service
        .add(path.into_inner(), comment.into_inner())
        .await
    {
        Ok(persisted) => HttpResponse::Created().json(persisted),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_comment(
    comment_service: web::Data<Arc<CommentService>>,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (post_id, comment_id) = path.into_inner();

    tracing::info!("Deleting comment id={} of post id={}", comment_id, post_id);

    match comment_service.remove(post_id, comment_id).await {
        Ok(persisted) => HttpResponse::Ok().json(persisted),
        Err(err) => error_to_response(err),
    }
}

pub async fn like_comment(
    comment_service: web::Data<Arc<CommentService>>,
    path: web::Path<(i64, i64)>,
    body: web::Json<CommentLikeRequest>,
) -> impl Responder {
    let (post_id, comment_id) = path.into_inner();

    match comment_service
        .like_toggle(post_id, comment_id, body.action)
        .await
    {
        Ok(persisted) => HttpResponse::Ok().json(LikesResponse {
            likes: persisted.value,
            persistence: persisted.persistence,
        }),
        Err(err) => error_to_response(err),
    }
}

// ============== Admin Handlers ==============

pub async fn admin_list_posts(blog_service: web::Data<Arc<BlogService>>) -> impl Responder {
    HttpResponse::Ok().json(blog_service.get_all().await)
}

pub async fn create_post(
    blog_service: web::Data<Arc<BlogService>>,
    post_data: web::Json<CreatePostRequest>,
) -> impl Responder {
    match blog_service.create(post_data.into_inner()).await {
        Ok(persisted) => HttpResponse::Created().json(persisted),
        Err(err) => error_to_response(err),
    }
}

pub async fn update_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
    post_data: web::Json<UpdatePostRequest>,
) -> impl Responder {
    let post_id = path.into_inner();

    tracing::info!("Updating post id={}", post_id);

    match blog_service.update(post_id, post_data.into_inner()).await {
        Ok(persisted) => HttpResponse::Ok().json(persisted),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let post_id = path.into_inner();

    tracing::info!("Deleting post id={}", post_id);

    match blog_service.delete(post_id).await {
        Ok(persisted) => HttpResponse::Ok().json(serde_json::json!({
            "id": persisted.value.id,
            "persistence": persisted.persistence,
        })),
        Err(err) => error_to_response(err),
    }
}

pub async fn toggle_post_status(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service.toggle_active(path.into_inner()).await {
        Ok(persisted) => HttpResponse::Ok().json(serde_json::json!({
            "active": persisted.value,
            "persistence": persisted.persistence,
        })),
        Err(err) => error_to_response(err),
    }
}

pub async fn sync_posts(sync_service: web::Data<Arc<SyncService>>) -> impl Responder {
    HttpResponse::Ok().json(sync_service.sync().await)
}

pub async fn initialize_posts(sync_service: web::Data<Arc<SyncService>>) -> impl Responder {
    HttpResponse::Ok().json(sync_service.initialize().await)
}
