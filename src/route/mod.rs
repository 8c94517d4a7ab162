use rocket::{Build, Request, Rocket, Route};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod cart;
pub mod class;
pub mod enrolled;
pub mod payment;
pub mod token;
pub mod users;

use cart::*;
use class::*;
use enrolled::*;
use payment::*;
use token::*;
use users::*;

use crate::{
    checkout::{CheckoutData, CheckoutReceipt, CheckoutResponse},
    data::{
        cart::{db::CartCreateData, CartItem},
        class::{
            db::{ClassCreateData, FeedbackUpdateData, StatusUpdateData},
            Class, ClassStatus,
        },
        enrolled::{db::EnrollmentCreateData, EnrolledClass},
        payment::{db::PaymentCreateData, Payment},
        user::{
            db::{RoleUpdateData, UserCreateData},
            User,
        },
    },
    resp::{
        jwt::{doc::JWTAuth, Identity},
        problem::{problems, Problem},
        result::{CreateResponse, DeleteResponse, ExistsResponse, InsertResponse, UpdateResponse},
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        token_issue,
        user_create,
        user_list,
        instructor_list,
        instructor_popular,
        user_set_role,
        user_is_admin,
        user_is_instructor,
        user_is_student,
        class_list,
        class_approved,
        class_popular,
        class_by_instructor,
        class_create,
        class_set_status,
        class_set_feedback,
        class_enroll,
        cart_list,
        cart_get,
        cart_add,
        cart_delete,
        payment_intent,
        payment_list,
        payment_create,
        checkout_complete,
        enrolled_list,
        enrolled_create
    ),
    components(schemas(
        Role,
        User,
        UserCreateData,
        RoleUpdateData,
        Class,
        ClassStatus,
        ClassCreateData,
        StatusUpdateData,
        FeedbackUpdateData,
        CartItem,
        CartCreateData,
        Payment,
        PaymentCreateData,
        PaymentIntentData,
        ClientSecretResponse,
        CheckoutData,
        CheckoutReceipt,
        CheckoutResponse,
        EnrolledClass,
        EnrollmentCreateData,
        TokenRequest,
        TokenResponse,
        InsertResponse,
        UpdateResponse,
        DeleteResponse,
        ExistsResponse,
        CreateResponse,
        Problem
    )),
    modifiers(&JWTAuth)
)]
pub struct ApiDoc;

/// Resolves the `email` filter of a per-student listing.
///
/// No email means an empty listing. Any email but the caller's own is
/// forbidden.
pub fn own_listing(identity: &Identity, email: Option<String>) -> Result<Option<String>, Problem> {
    match email {
        Some(email) if !identity.is(&email) => {
            tracing::debug!("{} asked for the records of {}", identity.email, email);
            Err(problems::forbidden())
        }
        other => Ok(other),
    }
}

#[get("/")]
pub fn index() -> &'static str {
    "Sporty Smash Server is running...."
}

pub fn api() -> Vec<Route> {
    routes![
        index,
        token_issue,
        user_create,
        user_list,
        instructor_list,
        instructor_popular,
        user_set_role,
        user_is_admin,
        user_is_instructor,
        user_is_student,
        class_list,
        class_approved,
        class_popular,
        class_by_instructor,
        class_create,
        class_set_status,
        class_set_feedback,
        class_enroll,
        cart_list,
        cart_get,
        cart_add,
        cart_delete,
        payment_intent,
        payment_list,
        payment_create,
        checkout_complete,
        enrolled_list,
        enrolled_create
    ]
}

// Guards drop their error value, so the bodies are rebuilt here.

#[catch(400)]
fn bad_request() -> Problem {
    problems::parse_problem()
}

#[catch(401)]
fn unauthorized() -> Problem {
    problems::unauthorized()
}

#[catch(403)]
fn forbidden() -> Problem {
    problems::forbidden()
}

#[catch(404)]
fn not_found(req: &Request) -> Problem {
    Problem::new(rocket::http::Status::NotFound, "Not found.")
        .insert_str("path", req.uri())
        .to_owned()
}

#[catch(422)]
fn unprocessable() -> Problem {
    Problem::new(
        rocket::http::Status::UnprocessableEntity,
        "Request body is missing required fields or has the wrong shape.",
    )
}

#[catch(500)]
fn internal_error() -> Problem {
    Problem::default()
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api())
        .mount(
            "/",
            SwaggerUi::new("/swagger-ui/<_..>").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_listing_resolves_filters() {
        let me = Identity {
            email: "s@x.com".to_string(),
        };

        assert_eq!(own_listing(&me, None).unwrap(), None);
        assert_eq!(
            own_listing(&me, Some("s@x.com".to_string())).unwrap(),
            Some("s@x.com".to_string())
        );

        let problem = own_listing(&me, Some("other@x.com".to_string())).unwrap_err();
        assert_eq!(problem.status, rocket::http::Status::Forbidden);
    }

    #[test]
    fn api_doc_lists_secured_paths() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/users"));
        assert!(doc.paths.paths.contains_key("/checkout"));
        assert!(doc
            .components
            .as_ref()
            .map(|c| c.security_schemes.contains_key("jwt"))
            .unwrap_or(false));
    }
}

#[cfg(test)]
mod endpoints {
    use chrono::Duration;
    use mongodb::Database;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{json, Value};

    use crate::config::Config;
    use crate::payment::fake::FakeGateway;
    use crate::resp::jwt::IdentityToken;
    use crate::security::Security;

    const SECRET: &[u8] = b"endpoint tests secret, 32+ bytes long";

    /// The MongoDB client connects lazily, so routes that fail before
    /// touching the database work without a server.
    async fn lazy_db() -> Database {
        mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .expect("invalid MongoDB uri")
            .database("sportyDB_test")
    }

    async fn client_with(c: Config, db: Database) -> Client {
        let rocket = crate::build(
            c,
            Security::from_secret(SECRET),
            db,
            Box::new(FakeGateway::default()),
        )
        .expect("invalid backend");

        Client::tracked(rocket).await.expect("invalid backend")
    }

    async fn client() -> Client {
        client_with(Config::default(), lazy_db().await).await
    }

    fn bearer(email: &str) -> Header<'static> {
        let token = IdentityToken::new(email, Duration::hours(1))
            .encode_jwt(SECRET)
            .expect("unable to sign test token");
        Header::new("Authorization", format!("Bearer {}", token))
    }

    #[rocket::async_test]
    async fn index_reports_running() {
        let client = client().await;
        let response = client.get("/").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_string().await.as_deref(),
            Some("Sporty Smash Server is running....")
        );
    }

    #[rocket::async_test]
    async fn jwt_issues_verifiable_token() {
        let client = client().await;
        let response = client
            .post("/jwt")
            .header(ContentType::JSON)
            .body(json!({"email": "a@x.com", "name": "A"}).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("invalid response json");
        let token = body["token"].as_str().expect("token missing");

        let claims = IdentityToken::decode_jwt(token, SECRET).expect("token doesn't verify");
        assert_eq!(claims.email, "a@x.com");
    }

    #[rocket::async_test]
    async fn jwt_rejects_malformed_email() {
        let client = client().await;
        let response = client
            .post("/jwt")
            .header(ContentType::JSON)
            .body(json!({"email": "nobody"}).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn protected_routes_need_a_token() {
        let client = client().await;

        let requests = vec![
            client.get("/users"),
            client.get("/users/admin/a@x.com"),
            client.get("/classes"),
            client.get("/classes/a@x.com"),
            client.get("/carts?email=a@x.com"),
            client.delete("/carts/some-id"),
            client.get("/payments"),
            client.get("/enrolledclasses"),
            client.patch("/classes/enrolled/some-id"),
        ];

        for request in requests {
            let response = request.dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized);
            assert_eq!(response.content_type(), Some(ContentType::JSON));

            let body: Value = response.into_json().await.expect("invalid response json");
            assert_eq!(body["error"], json!(true));
            assert_eq!(body["message"], json!("Unauthorized access"));
        }
    }

    #[rocket::async_test]
    async fn forged_token_is_unauthorized() {
        let client = client().await;
        let token = IdentityToken::new("a@x.com", Duration::hours(1))
            .encode_jwt(b"not the server secret at all, but long")
            .unwrap();

        let response = client
            .get("/users/student/a@x.com")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn role_check_for_someone_else_is_false() {
        let client = client().await;
        let response = client
            .get("/users/admin/boss@x.com")
            .header(bearer("a@x.com"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body, json!({"admin": false}));
    }

    #[rocket::async_test]
    async fn unknown_path_is_a_problem() {
        let client = client().await;
        let response = client.get("/nowhere").dispatch().await;

        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["error"], json!(true));
    }

    #[rocket::async_test]
    async fn openapi_document_is_served() {
        let client = client().await;
        let response = client.get("/api-docs/openapi.json").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
    }

    async fn post_json(client: &Client, path: &str, auth: Option<&str>, body: Value) -> Value {
        let mut request = client
            .post(path.to_string())
            .header(ContentType::JSON)
            .body(body.to_string());
        if let Some(email) = auth {
            request = request.header(bearer(email));
        }
        let response = request.dispatch().await;
        assert_eq!(response.status(), Status::Ok, "POST {}", path);
        response.into_json().await.expect("invalid response json")
    }

    async fn patch_json(client: &Client, path: &str, auth: &str, body: Value) -> Value {
        let response = client
            .patch(path.to_string())
            .header(ContentType::JSON)
            .header(bearer(auth))
            .body(body.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "PATCH {}", path);
        response.into_json().await.expect("invalid response json")
    }

    async fn get_json(client: &Client, path: &str, auth: Option<&str>) -> Value {
        let mut request = client.get(path.to_string());
        if let Some(email) = auth {
            request = request.header(bearer(email));
        }
        let response = request.dispatch().await;
        assert_eq!(response.status(), Status::Ok, "GET {}", path);
        response.into_json().await.expect("invalid response json")
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB server on localhost:27017"]
    async fn class_approval_and_enrollment_flow() {
        use crate::data::user::db::UserDbExt;

        let db = lazy_db().await;
        crate::data::ensure_indexes(&db).await.expect("unable to create indexes");

        let run = crate::data::new_id();
        let admin = format!("admin-{}@example.com", run);
        let instructor = format!("coach-{}@example.com", run);
        let student = format!("student-{}@example.com", run);

        let mut c = Config::default();
        c.admin_emails = vec![admin.clone()];
        let client = client_with(c, db.clone()).await;

        post_json(&client, "/users", None, json!({"email": admin})).await;
        let created = post_json(&client, "/users", None, json!({"email": instructor})).await;
        assert!(created["insertedId"].is_string());
        let again = post_json(&client, "/users", None, json!({"email": instructor})).await;
        assert_eq!(again, json!({"message": "User Already Exists..."}));
        post_json(&client, "/users", None, json!({"email": student})).await;

        for (email, role) in [(&instructor, "instructor"), (&student, "student")] {
            let user = db
                .find_user_by_email(email)
                .await
                .unwrap()
                .expect("user wasn't stored");
            assert_eq!(user.role, None);
            let path = format!("/users/{}", user.id);
            let updated = patch_json(&client, &path, &admin, json!({"role": role})).await;
            assert_eq!(updated["modifiedCount"], json!(1));
        }

        let check = format!("/users/instructor/{}", instructor);
        assert_eq!(
            get_json(&client, &check, Some(&instructor)).await,
            json!({"instructor": true})
        );

        let class = post_json(
            &client,
            "/classes",
            Some(&instructor),
            json!({"name": "Boxing", "price": 45.0, "availableSeats": 10}),
        )
        .await;
        let class_id = class["insertedId"].as_str().expect("class id").to_string();

        let listed = |classes: &Value| {
            classes
                .as_array()
                .map(|all| all.iter().any(|it| it["_id"] == json!(class_id)))
                .unwrap_or(false)
        };
        assert!(!listed(&get_json(&client, "/classes/approved", None).await));

        let status = format!("/classes/status/{}", class_id);
        patch_json(&client, &status, &admin, json!({"status": "approved"})).await;
        assert!(listed(&get_json(&client, "/classes/approved", None).await));

        let entry = json!({"classId": class_id, "studentEmail": student});
        let added = post_json(&client, "/carts", Some(&student), entry.clone()).await;
        let cart_id = added["insertedId"].as_str().expect("cart id").to_string();
        let again = post_json(&client, "/carts", Some(&student), entry.clone()).await;
        assert_eq!(
            again,
            json!({"exist": true, "message": "You have already added this class to your cart!"})
        );
        let cart_path = format!("/carts?email={}", student);
        let cart = get_json(&client, &cart_path, Some(&student)).await;
        assert_eq!(cart.as_array().map(Vec::len), Some(1));

        let response = client
            .delete(format!("/carts/{}", cart_id))
            .header(bearer(&student))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        post_json(&client, "/enrolledclasses", Some(&student), entry.clone()).await;
        let rejected = post_json(&client, "/carts", Some(&student), entry).await;
        assert_eq!(
            rejected,
            json!({"exist": true, "message": "You have already enrolled into this class!"})
        );

        for (collection, field, value) in [
            ("users", "email", &admin),
            ("users", "email", &instructor),
            ("users", "email", &student),
            ("classes", "_id", &class_id),
            ("enrolledClasses", "studentEmail", &student),
            ("carts", "studentEmail", &student),
        ] {
            let mut filter = bson::Document::new();
            filter.insert(field, value.as_str());
            db.collection::<bson::Document>(collection)
                .delete_many(filter, None)
                .await
                .expect("cleanup failed");
        }
    }
}
