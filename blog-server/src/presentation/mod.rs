pub mod http_handlers;
pub mod middleware;

use crate::application::{AuthService, BlogService, CommentService, Stores, SyncService};
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;
use std::sync::Arc;

/// Services shared by every HTTP worker.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub blog: Arc<BlogService>,
    pub comments: Arc<CommentService>,
    pub sync: Arc<SyncService>,
}

impl AppServices {
    pub fn new(stores: Stores, auth: AuthService) -> Self {
        Self {
            auth: Arc::new(auth),
            blog: Arc::new(BlogService::new(stores.clone())),
            comments: Arc::new(CommentService::new(stores.clone())),
            sync: Arc::new(SyncService::new(stores)),
        }
    }
}

/// Registers the services and every route on an actix app.
pub fn configure(services: AppServices) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let auth_middleware = HttpAuthentication::bearer(middleware::jwt_middleware);

        cfg.app_data(web::Data::new(services.auth))
            .app_data(web::Data::new(services.blog))
            .app_data(web::Data::new(services.comments))
            .app_data(web::Data::new(services.sync))
            // Public routes - authentication
            .service(
                web::scope("/api/auth").route("/login", web::post().to(http_handlers::login)),
            )
            // Public routes - posts
            .service(
                web::scope("/api/posts")
                    .route("", web::get().to(http_handlers::list_posts))
                    .route("/{url_id}", web::get().to(http_handlers::get_post))
                    .route("/{id}/like", web::post().to(http_handlers::like_post)),
            )
            .service(
                web::scope("/api/catalog")
                    .route("/categories", web::get().to(http_handlers::list_categories))
                    .route("/tags", web::get().to(http_handlers::list_tags))
                    .route("/history", web::get().to(http_handlers::list_history)),
            )
            .service(
                web::scope("/api/comments")
                    .route("/{post_id}", web::get().to(http_handlers::list_comments))
                    .route("/{post_id}", web::post().to(http_handlers::add_comment))
                    .route(
                        "/{post_id}/{comment_id}",
                        web::delete().to(http_handlers::delete_comment),
                    )
                    .route(
                        "/{post_id}/{comment_id}/like",
                        web::post().to(http_handlers::like_comment),
                    ),
            )
            // Protected routes - admin console
            .service(
                web::scope("/api/admin")
                    .wrap(auth_middleware)
                    .route("/posts", web::get().to(http_handlers::admin_list_posts))
                    .route("/posts", web::post().to(http_handlers::create_post))
                    .route("/posts/{id}", web::put().to(http_handlers::update_post))
                    .route("/posts/{id}", web::delete().to(http_handlers::delete_post))
                    .route(
                        "/posts/{id}/toggle-status",
                        web::post().to(http_handlers::toggle_post_status),
                    )
                    .route("/sync", web::post().to(http_handlers::sync_posts))
                    .route("/initialize", web::post().to(http_handlers::initialize_posts)),
            );
    }
}
