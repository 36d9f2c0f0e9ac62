// A router rebuilt from a cached snapshot must behave exactly like the one
// built from the sources
#[cfg(test)]
mod test {
    use std::sync::Arc;

    use http::{Method, StatusCode};
    use junction::{
        adapters::{ActionController, FileRouteCache, MemoryRouteCache, ServiceContainer, builtin_registry},
        config::{HandlerSpec, LoadStats, RouteDefinition, RouteLoader},
        core::{ClosureHandler, RouteParams, RouteRequest, Router, RoutingError},
        ports::route_cache::{CacheError, RouteCache},
    };
    use tempfile::tempdir;

    const ROUTES: &str = r#"
group: blog
routes:
  - methods: [GET, POST]
    path: /posts
    handler: "PostController@index"
    name: posts.index
  - method: GET
    path: /posts/{id}
    handler: ["PostController", "show"]
    name: posts.show
    middleware: [security_headers]
    priority: 5
  - method: DELETE
    path: /posts/{id}
    handler: "PostController@destroy"
"#;

    fn services() -> Arc<ServiceContainer> {
        let mut container = ServiceContainer::new();
        container.singleton(
            "PostController",
            ActionController::new()
                .action("index", |req, mut resp, _params| {
                    resp.write(format!("index {}", req.method()));
                    Ok(resp)
                })
                .action("show", |_req, mut resp, params| {
                    resp.write(format!("show {}", params["id"]));
                    Ok(resp)
                })
                .action("destroy", |_req, mut resp, params| {
                    resp.write(format!("destroy {}", params["id"]));
                    Ok(resp)
                }),
        );
        Arc::new(container)
    }

    async fn load(loader: &RouteLoader) -> (Router, LoadStats) {
        let mut router = Router::new(services());
        let stats = loader.load_into(&mut router).await.unwrap();
        (router, stats)
    }

    fn sample_requests() -> Vec<(Method, &'static str)> {
        vec![
            (Method::GET, "/posts"),
            (Method::POST, "/posts"),
            (Method::HEAD, "/posts"),
            (Method::GET, "/posts/42"),
            (Method::DELETE, "/posts/42"),
            (Method::PUT, "/posts/42"),
            (Method::GET, "/posts/42/"),
            (Method::GET, "/authors"),
        ]
    }

    fn assert_same_behavior(built: &Router, restored: &Router) {
        assert_eq!(built.summaries(), restored.summaries());

        for (method, path) in sample_requests() {
            let a = built.handle(RouteRequest::new(method.clone(), path));
            let b = restored.handle(RouteRequest::new(method.clone(), path));
            assert_eq!(a.status(), b.status(), "{method} {path}");
            assert_eq!(a.body_text(), b.body_text(), "{method} {path}");
            assert_eq!(
                a.headers().get(http::header::X_CONTENT_TYPE_OPTIONS),
                b.headers().get(http::header::X_CONTENT_TYPE_OPTIONS),
                "{method} {path}"
            );
        }

        let params = RouteParams::from([("id".to_string(), "7".to_string())]);
        assert_eq!(
            built.url("posts.show", &params, None).unwrap(),
            restored.url("posts.show", &params, None).unwrap()
        );
    }

    #[tokio::test]
    async fn test_memory_cache_restores_identical_router() {
        let dir = tempdir().unwrap();
        let routes = dir.path().join("routes.yaml");
        std::fs::write(&routes, ROUTES).unwrap();

        let loader = RouteLoader::new(builtin_registry())
            .file(&routes, None)
            .with_cache(Arc::new(MemoryRouteCache::new()));

        let (built, first) = load(&loader).await;
        assert!(!first.from_cache);
        assert_eq!(first.files_loaded, 1);
        assert_eq!(first.total_routes, 3);

        let (restored, second) = load(&loader).await;
        assert!(second.from_cache);
        assert_eq!(second.total_routes, 3);
        assert_eq!(second.per_group, first.per_group);

        assert_same_behavior(&built, &restored);

        let response = restored.handle(RouteRequest::get("/posts/42"));
        assert_eq!(response.body_text(), "show 42");
        assert_eq!(
            response.headers()[http::header::X_CONTENT_TYPE_OPTIONS],
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_file_cache_survives_new_loader() {
        let dir = tempdir().unwrap();
        let routes = dir.path().join("routes.yaml");
        let cache_path = dir.path().join("cache").join("routes.json");
        std::fs::write(&routes, ROUTES).unwrap();

        let new_loader = || {
            RouteLoader::new(builtin_registry())
                .file(&routes, None)
                .with_cache(Arc::new(FileRouteCache::new(&cache_path)))
        };

        let (built, first) = load(&new_loader()).await;
        assert!(!first.from_cache);
        assert!(cache_path.exists());

        let (restored, second) = load(&new_loader()).await;
        assert!(second.from_cache);
        assert_same_behavior(&built, &restored);
    }

    #[tokio::test]
    async fn test_edited_source_invalidates_snapshot() {
        let dir = tempdir().unwrap();
        let routes = dir.path().join("routes.yaml");
        let cache_path = dir.path().join("routes.cache.json");
        std::fs::write(&routes, ROUTES).unwrap();

        let new_loader = || {
            RouteLoader::new(builtin_registry())
                .file(&routes, None)
                .with_cache(Arc::new(FileRouteCache::new(&cache_path)))
        };
        load(&new_loader()).await;

        let edited = format!(
            "{ROUTES}  - method: GET\n    path: /about\n    handler: \"PageController@about\"\n"
        );
        std::fs::write(&routes, edited).unwrap();

        let (router, stats) = load(&new_loader()).await;
        assert!(!stats.from_cache);
        assert_eq!(stats.total_routes, 4);
        assert!(router.match_route(&Method::GET, "/about").is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_cache_file_falls_back_to_sources() {
        let dir = tempdir().unwrap();
        let routes = dir.path().join("routes.yaml");
        let cache_path = dir.path().join("routes.cache.json");
        std::fs::write(&routes, ROUTES).unwrap();
        std::fs::write(&cache_path, "{ not json").unwrap();

        let cache = Arc::new(FileRouteCache::new(&cache_path));
        let loader = RouteLoader::new(builtin_registry())
            .file(&routes, None)
            .with_cache(cache.clone());

        let (_, stats) = load(&loader).await;
        assert!(!stats.from_cache);
        assert_eq!(stats.total_routes, 3);

        // The bad file was replaced by a usable snapshot.
        let fingerprint = loader.fingerprint().await.unwrap();
        assert!(cache.load(&fingerprint).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tampered_matcher_is_not_restored() {
        let dir = tempdir().unwrap();
        let routes = dir.path().join("routes.yaml");
        let cache_path = dir.path().join("routes.cache.json");
        std::fs::write(&routes, ROUTES).unwrap();

        let new_loader = || {
            RouteLoader::new(builtin_registry())
                .file(&routes, None)
                .with_cache(Arc::new(FileRouteCache::new(&cache_path)))
        };
        load(&new_loader()).await;

        let stored = std::fs::read_to_string(&cache_path).unwrap();
        let needle = r#""^/posts/([^/]+)$""#;
        assert!(stored.contains(needle), "{stored}");
        std::fs::write(&cache_path, stored.replace(needle, r#""^/admin/([^/]+)$""#)).unwrap();

        let (router, stats) = load(&new_loader()).await;
        assert!(!stats.from_cache);
        assert!(router.match_route(&Method::GET, "/posts/42").is_ok());
        assert!(router.match_route(&Method::GET, "/admin/42").is_err());
    }

    #[tokio::test]
    async fn test_closure_routes_cannot_be_cached() {
        let definitions = vec![
            RouteDefinition::new(["GET"], "/posts", HandlerSpec::Named("PostController@index".into())),
            RouteDefinition::new(
                ["GET"],
                "/inline",
                HandlerSpec::Closure(ClosureHandler::new(|_req, resp, _params| Ok(resp))),
            ),
        ];

        let cache = Arc::new(MemoryRouteCache::new());
        let loader = RouteLoader::new(builtin_registry())
            .inline(Some("api"), definitions.clone())
            .with_cache(cache.clone());

        let mut router = Router::new(services());
        let err = loader.load_into(&mut router).await.unwrap_err();
        match err.downcast_ref::<CacheError>() {
            Some(CacheError::UncacheableRoutes { routes }) => {
                assert_eq!(routes, &["GET /inline".to_string()]);
            }
            other => panic!("expected UncacheableRoutes, got {other:?}"),
        }
        assert!(router.routes().is_empty());
        assert!(cache.is_empty());

        // Without a cache the same routes load normally.
        let (router, stats) = load(&RouteLoader::new(builtin_registry()).inline(Some("api"), definitions)).await;
        assert_eq!(stats.total_routes, 2);
        assert_eq!(stats.per_group.get("api"), Some(&2));
        assert_eq!(router.handle(RouteRequest::get("/inline")).status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_restored_router_reports_missing_named_route() {
        let loader = RouteLoader::new(builtin_registry())
            .inline(
                None,
                vec![
                    RouteDefinition::new(["GET"], "/posts", HandlerSpec::Named("PostController@index".into()))
                        .name("posts.index"),
                ],
            )
            .with_cache(Arc::new(MemoryRouteCache::new()));

        load(&loader).await;
        let (restored, stats) = load(&loader).await;
        assert!(stats.from_cache);
        assert_eq!(stats.per_group.get("default"), Some(&1));

        let err = restored
            .url("posts.missing", &RouteParams::new(), None)
            .unwrap_err();
        assert!(matches!(err, RoutingError::NamedRouteNotFound { .. }));
        assert_eq!(
            restored.url("posts.index", &RouteParams::new(), None).unwrap(),
            "/posts"
        );
    }
}
