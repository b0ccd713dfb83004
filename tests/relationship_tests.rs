//! HTTP tests for relationship data, related endpoints and relationship
//! modification

mod support;

use axum::http::StatusCode;
use jsonapi::prelude::*;
use serde_json::{Value, json};
use support::*;

async fn create_selection(server: &axum_test::TestServer, name: &str, posts: &[&str]) -> String {
    let data: Vec<Value> = posts.iter().map(|id| identifier("posts", id)).collect();
    create(
        server,
        "selections",
        json!({"name": name}),
        json!({"posts": {"data": data}}),
    )
    .await
}

async fn create_reply(server: &axum_test::TestServer, post: &str, parent: &str, message: &str) -> String {
    create(
        server,
        "comments",
        json!({"message": message}),
        json!({
            "post": {"data": identifier("posts", post)},
            "parent": {"data": identifier("comments", parent)},
        }),
    )
    .await
}

async fn get_json(server: &axum_test::TestServer, path: &str) -> Value {
    let response = server.get(path).await;
    response.assert_status_ok();
    response.json()
}

// =============================================================================
// Relationship data embedded in resources
// =============================================================================

mod embedded_tests {
    use super::*;

    #[tokio::test]
    async fn test_has_many_resolved_through_to_one_inverse() {
        let (server, store) = server();
        let post = create_post(&server, "Post").await;
        let first = create_comment(&server, &post, "first").await;
        let second = create_comment(&server, &post, "second").await;
        let other = create_post(&server, "Other").await;
        create_comment(&server, &other, "elsewhere").await;

        let body = get_json(&server, &format!("/posts/{}", post)).await;
        let comments = &body["data"]["relationships"]["comments"]["data"];
        assert_eq!(linkage_ids(comments), vec![first, second]);
        assert_eq!(comments[0]["type"], "comments");
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_has_many_resolved_through_to_many_inverse() {
        let (server, _) = server();
        let first = create_post(&server, "First").await;
        let second = create_post(&server, "Second").await;
        let both = create_selection(&server, "both", &[first.as_str(), second.as_str()]).await;
        let only = create_selection(&server, "only", &[second.as_str()]).await;

        let body = get_json(&server, &format!("/posts/{}", first)).await;
        assert_eq!(
            linkage_ids(&body["data"]["relationships"]["selections"]["data"]),
            vec![both.clone()]
        );

        let body = get_json(&server, &format!("/posts/{}", second)).await;
        assert_eq!(
            linkage_ids(&body["data"]["relationships"]["selections"]["data"]),
            vec![both, only]
        );
    }

    #[tokio::test]
    async fn test_to_one_and_to_many_data() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        let body = get_json(&server, &format!("/comments/{}", comment)).await;
        let relationships = &body["data"]["relationships"];
        assert_eq!(relationships["post"]["data"], identifier("posts", &post));
        assert_eq!(relationships["parent"]["data"], Value::Null);
        assert_eq!(relationships["replies"]["data"], json!([]));

        let other = create_post(&server, "Other").await;
        let selection = create_selection(&server, "pick", &[other.as_str(), post.as_str()]).await;
        let body = get_json(&server, &format!("/selections/{}", selection)).await;
        assert_eq!(
            linkage_ids(&body["data"]["relationships"]["posts"]["data"]),
            vec![other, post]
        );
    }

    #[tokio::test]
    async fn test_deleted_comment_leaves_has_many() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let keep = create_comment(&server, &post, "keep").await;
        let removed = create_comment(&server, &post, "drop").await;

        server
            .delete(&format!("/comments/{}", removed))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body = get_json(&server, &format!("/posts/{}", post)).await;
        assert_eq!(
            linkage_ids(&body["data"]["relationships"]["comments"]["data"]),
            vec![keep]
        );
    }

    #[tokio::test]
    async fn test_reference_of_wrong_type_is_400() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;

        let response = server
            .post("/comments")
            .json(&json!({"data": {
                "type": "comments",
                "attributes": {"message": "hi"},
                "relationships": {"post": {"data": identifier("comments", &post)}}
            }}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/comments")
            .json(&json!({"data": {
                "type": "comments",
                "attributes": {"message": "hi"},
                "relationships": {"post": {"data": [identifier("posts", &post)]}}
            }}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Related endpoints
// =============================================================================

mod related_tests {
    use super::*;

    #[tokio::test]
    async fn test_related_to_one() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        let path = format!("/comments/{}/post", comment);
        let body = get_json(&server, &path).await;
        assert_eq!(body["links"]["self"], path.as_str());
        assert_eq!(body["data"]["type"], "posts");
        assert_eq!(body["data"]["id"], post.as_str());
        assert_eq!(body["data"]["attributes"]["title"], "Post");
        assert_eq!(
            linkage_ids(&body["data"]["relationships"]["comments"]["data"]),
            vec![comment]
        );
    }

    #[tokio::test]
    async fn test_related_to_one_unset_is_null() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        let path = format!("/comments/{}/parent", comment);
        let body = get_json(&server, &path).await;
        assert_eq!(body, json!({"data": null, "links": {"self": path}}));
    }

    #[tokio::test]
    async fn test_related_to_one_dangling_is_null() {
        let (server, store) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;
        server
            .delete(&format!("/posts/{}", post))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body = get_json(&server, &format!("/comments/{}/post", comment)).await;
        assert_eq!(body["data"], Value::Null);
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_related_has_many_collection() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let first = create_comment(&server, &post, "b").await;
        let second = create_comment(&server, &post, "a").await;

        let path = format!("/posts/{}/comments", post);
        let body = get_json(&server, &path).await;
        assert_eq!(ids(&body), vec![first.clone(), second.clone()]);
        assert_eq!(body["links"]["self"], path.as_str());
        assert_eq!(body["data"][0]["attributes"]["message"], "b");

        // list parameters apply to the related collection
        let body: Value = server
            .get(&path)
            .add_query_param("sort", "message")
            .await
            .json();
        assert_eq!(ids(&body), vec![second, first]);

        let body: Value = server
            .get(&path)
            .add_query_param("page[size]", "1")
            .await
            .json();
        assert_eq!(ids(&body).len(), 1);
        assert_eq!(
            body["links"]["next"],
            format!("{}?page[number]=2&page[size]=1", path).as_str()
        );
    }

    #[tokio::test]
    async fn test_related_replies() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let parent = create_comment(&server, &post, "parent").await;
        let reply = create_reply(&server, &post, &parent, "reply").await;

        let body = get_json(&server, &format!("/comments/{}/replies", parent)).await;
        assert_eq!(ids(&body), vec![reply.clone()]);

        let body = get_json(&server, &format!("/comments/{}/parent", reply)).await;
        assert_eq!(body["data"]["id"], parent.as_str());

        let body = get_json(&server, &format!("/comments/{}/replies", reply)).await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_related_to_many_collection() {
        let (server, _) = server();
        let first = create_post(&server, "First").await;
        let second = create_post(&server, "Second").await;
        create_post(&server, "Third").await;
        let selection = create_selection(&server, "pick", &[second.as_str(), first.as_str()]).await;

        let body = get_json(&server, &format!("/selections/{}/posts", selection)).await;
        let mut related = ids(&body);
        related.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(related, expected);

        let body = get_json(&server, &format!("/posts/{}/selections", expected[0])).await;
        assert_eq!(ids(&body), vec![selection]);
    }

    #[tokio::test]
    async fn test_no_list_does_not_block_related_listing() {
        let store = InMemoryStore::new();
        let mut controllers = controllers(&store);
        controllers.comments = controllers.comments.no_list(true);
        let server = serve(controllers);

        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        server.get("/comments").await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body = get_json(&server, &format!("/posts/{}/comments", post)).await;
        assert_eq!(ids(&body), vec![comment]);
    }

    #[tokio::test]
    async fn test_related_of_missing_resource_is_404() {
        let (server, _) = server();
        server
            .get(&format!("/posts/{}/comments", Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Relationship endpoints
// =============================================================================

mod relationship_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_relationship_document() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        let body = get_json(&server, &format!("/comments/{}/relationships/post", comment)).await;
        assert_eq!(
            body,
            json!({
                "links": {
                    "self": format!("/comments/{}/relationships/post", comment),
                    "related": format!("/comments/{}/post", comment),
                },
                "data": identifier("posts", &post),
            })
        );

        let body = get_json(&server, &format!("/posts/{}/relationships/comments", post)).await;
        assert_eq!(linkage_ids(&body["data"]), vec![comment]);
    }

    #[tokio::test]
    async fn test_set_to_one() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let parent = create_comment(&server, &post, "parent").await;
        let comment = create_comment(&server, &post, "child").await;
        let path = format!("/comments/{}/relationships/parent", comment);

        server
            .patch(&path)
            .json(&json!({"data": identifier("comments", &parent)}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(body["data"]["id"], parent.as_str());

        server
            .patch(&path)
            .json(&json!({"data": null}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn test_required_to_one_cannot_be_cleared() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        server
            .patch(&format!("/comments/{}/relationships/post", comment))
            .json(&json!({"data": null}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_to_one_only_supports_replacement() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;
        let path = format!("/comments/{}/relationships/post", comment);

        server
            .post(&path)
            .json(&json!({"data": [identifier("posts", &post)]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .delete(&path)
            .json(&json!({"data": [identifier("posts", &post)]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_set_append_remove_to_many() {
        let (server, store) = server();
        let a = create_post(&server, "a").await;
        let b = create_post(&server, "b").await;
        let c = create_post(&server, "c").await;
        let selection = create_selection(&server, "pick", &[a.as_str()]).await;
        let path = format!("/selections/{}/relationships/posts", selection);

        // append keeps order and skips present ids
        server
            .post(&path)
            .json(&json!({"data": [identifier("posts", &c), identifier("posts", &a), identifier("posts", &b)]}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(linkage_ids(&body["data"]), vec![a.clone(), c.clone(), b.clone()]);

        // removing an absent id is a no-op
        server
            .delete(&path)
            .json(&json!({"data": [identifier("posts", &c), identifier("posts", &Uuid::new_v4().to_string())]}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(linkage_ids(&body["data"]), vec![a.clone(), b.clone()]);

        // set replaces
        server
            .patch(&path)
            .json(&json!({"data": [identifier("posts", &b)]}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(linkage_ids(&body["data"]), vec![b.clone()]);

        server
            .patch(&path)
            .json(&json!({"data": []}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let body = get_json(&server, &path).await;
        assert_eq!(body["data"], json!([]));

        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_to_many_rejects_single_identifier() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let selection = create_selection(&server, "pick", &[]).await;

        server
            .post(&format!("/selections/{}/relationships/posts", selection))
            .json(&json!({"data": identifier("posts", &post)}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_has_many_is_read_only() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;
        let comment = create_comment(&server, &post, "hi").await;

        let response = server
            .patch(&format!("/posts/{}/relationships/comments", post))
            .json(&json!({"data": [identifier("comments", &comment)]}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert!(body["errors"][0]["detail"].as_str().unwrap().contains("read-only"));
    }

    #[tokio::test]
    async fn test_unknown_relationship_is_404() {
        let (server, _) = server();
        let post = create_post(&server, "Post").await;

        server
            .get(&format!("/posts/{}/relationships/likes", post))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .patch(&format!("/posts/{}/relationships/title", post))
            .json(&json!({"data": null}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_modify_missing_resource_is_404() {
        let (server, _) = server();
        server
            .patch(&format!("/selections/{}/relationships/posts", Uuid::new_v4()))
            .json(&json!({"data": []}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_modify_requires_data() {
        let (server, _) = server();
        let selection = create_selection(&server, "pick", &[]).await;
        server
            .patch(&format!("/selections/{}/relationships/posts", selection))
            .json(&json!({"posts": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
