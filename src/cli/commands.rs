//! CLI command implementations
//!
//! - redact: mask sensitive pairs in log lines
//! - hash-password: print a PHC hash for one password
//! - start: answer JSON auth requests line by line

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::{Cli, Command};
use super::errors::CliResult;
use super::io::{read_line, read_requests, write_json};
use crate::auth::{
    authorize_request, build_strategy, Argon2Hasher, AuthConfig, AuthError, AuthStrategy,
    InMemoryUserStore, PasswordHasher, RequestCredentials, SessionAuthority, User,
};
use crate::observability::{
    log_event_with_fields, Event, Logger, RedactingFormatter, PII_FIELDS,
};

/// Path the request loop checks session-backed operations against
const PROFILE_PATH: &str = "/api/v1/users/me";

/// Run the CLI with parsed arguments
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run a specific command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Redact {
            fields,
            separator,
            redaction,
        } => {
            let fields =
                fields.unwrap_or_else(|| PII_FIELDS.iter().map(|f| f.to_string()).collect());
            let stdin = io::stdin();
            let stdout = io::stdout();
            redact(stdin.lock(), stdout.lock(), &fields, &separator, &redaction)
        }
        Command::HashPassword => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            hash_password(&mut stdin.lock(), &mut stdout.lock())
        }
        Command::Start { config } => start(config.as_deref()),
    }
}

/// Redact every input line into the output
pub fn redact<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    fields: &[String],
    separator: &str,
    redaction: &str,
) -> CliResult<()> {
    let formatter = RedactingFormatter::with_options(fields, redaction, separator)?;
    for line in input.lines() {
        writeln!(output, "{}", formatter.redact(&line?))?;
    }
    output.flush()?;
    Ok(())
}

/// Hash the first input line and write the PHC string
pub fn hash_password<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> CliResult<()> {
    let password = read_line(input)?;
    let hash = Argon2Hasher.hash(&password)?;
    writeln!(output, "{}", hash)?;
    output.flush()?;
    Ok(())
}

/// Serve requests from stdin until EOF
///
/// Without `--config` the configuration comes from the environment. Stdout
/// carries responses only; log events go to stderr.
pub fn start(config_path: Option<&Path>) -> CliResult<()> {
    Logger::route_all_to_stderr();

    let config = match config_path {
        Some(path) => AuthConfig::load(path)?,
        None => AuthConfig::from_env()?,
    };

    let handler = RequestHandler::new(config);
    log_event_with_fields(
        Event::Serving,
        &[("auth_type", handler.config.auth_type.as_str())],
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&handler, stdin.lock(), &mut stdout.lock())
}

/// Answer each request line with exactly one response line
///
/// A read failure is answered with a final error line and ends the loop.
pub fn serve<R: BufRead, W: Write>(
    handler: &RequestHandler,
    input: R,
    output: &mut W,
) -> CliResult<()> {
    for request in read_requests(input) {
        let response = match request {
            Ok(Ok(value)) => handler.handle(&value),
            Ok(Err(parse_error)) => error_body(400, &format!("Invalid JSON: {}", parse_error)),
            Err(e) => {
                write_json(output, &error_body(500, &e.to_string()))?;
                break;
            }
        };
        write_json(output, &response)?;
    }
    Ok(())
}

/// A request that failed before or inside the authority
#[derive(Debug)]
enum RequestError {
    BadRequest(String),
    Auth(AuthError),
}

impl From<AuthError> for RequestError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

type RequestResult = Result<Value, RequestError>;

/// Dispatches JSON requests to an in-memory authority
pub struct RequestHandler {
    authority: Arc<SessionAuthority>,
    strategy: Option<Box<dyn AuthStrategy>>,
    config: AuthConfig,
}

impl RequestHandler {
    /// Build an in-memory authority and the configured strategy
    pub fn new(config: AuthConfig) -> Self {
        let authority = Arc::new(SessionAuthority::with_policy(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(Argon2Hasher),
            config.password_policy.clone(),
        ));
        let strategy = build_strategy(&config, Arc::clone(&authority));
        Self {
            authority,
            strategy,
            config,
        }
    }

    /// The authority requests run against
    pub fn authority(&self) -> &Arc<SessionAuthority> {
        &self.authority
    }

    /// Answer one request
    ///
    /// Every outcome is a response object; nothing here ends the loop.
    pub fn handle(&self, request: &Value) -> Value {
        let result = match request.get("op").and_then(Value::as_str) {
            Some("register") => self.register(request),
            Some("login") => self.login(request),
            Some("profile") => self.profile(request),
            Some("logout") => self.logout(request),
            Some("reset_token") => self.reset_token(request),
            Some("update_password") => self.update_password(request),
            Some(other) => Err(RequestError::BadRequest(format!("Unknown op: {}", other))),
            None => Err(RequestError::BadRequest("Missing op".to_string())),
        };

        match result {
            Ok(data) => json!({"status": "ok", "code": 200, "data": data}),
            Err(RequestError::BadRequest(message)) => error_body(400, &message),
            Err(RequestError::Auth(e)) => error_body(e.status_code(), &e.to_string()),
        }
    }

    fn register(&self, request: &Value) -> RequestResult {
        let email = field(request, "email")?;
        let password = field(request, "password")?;
        let user = self.authority.register(email, password)?;
        Ok(json!({"email": user.email, "message": "user created"}))
    }

    fn login(&self, request: &Value) -> RequestResult {
        let email = field(request, "email")?;
        let password = field(request, "password")?;

        if !self.authority.validate_credentials(email, password)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        let user = self
            .authority
            .user_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        let session_id = match self.strategy.as_deref() {
            Some(strategy) => strategy.create_session(&user)?,
            None => self.authority.create_session(email)?,
        };

        Ok(json!({
            "email": user.email,
            "session_name": self.config.session_name,
            "session_id": session_id,
        }))
    }

    fn profile(&self, request: &Value) -> RequestResult {
        let user = self.current_user(request)?.ok_or(AuthError::Forbidden)?;
        Ok(json!(user))
    }

    fn logout(&self, request: &Value) -> RequestResult {
        let credentials = self.credentials(request);
        let destroyed = match self.strategy.as_deref() {
            Some(strategy) => strategy.destroy_session(&credentials)?,
            None => match self.current_user(request)? {
                Some(user) => {
                    self.authority.destroy_session(Some(user.id))?;
                    true
                }
                None => false,
            },
        };

        if !destroyed {
            return Err(AuthError::Forbidden.into());
        }
        Ok(json!({}))
    }

    fn reset_token(&self, request: &Value) -> RequestResult {
        let email = field(request, "email")?;
        let token = self
            .authority
            .issue_reset_token(email)
            .map_err(|e| match e {
                AuthError::NotFound => AuthError::Forbidden,
                other => other,
            })?;
        Ok(json!({"email": email, "reset_token": token}))
    }

    fn update_password(&self, request: &Value) -> RequestResult {
        let email = field(request, "email")?;
        let token = field(request, "reset_token")?;
        let new_password = field(request, "new_password")?;
        self.authority.consume_reset_token(token, new_password)?;
        Ok(json!({"email": email, "message": "Password updated"}))
    }

    fn current_user(&self, request: &Value) -> Result<Option<User>, RequestError> {
        let credentials = self.credentials(request);
        let user = match self.strategy.as_deref() {
            Some(strategy) => {
                authorize_request(Some(strategy), &credentials, &self.config.excluded_paths)?
            }
            None => match credentials.cookie(&self.config.session_name) {
                Some(token) => self.authority.resolve_session(token)?,
                None => None,
            },
        };
        Ok(user)
    }

    fn credentials(&self, request: &Value) -> RequestCredentials {
        let mut credentials = RequestCredentials::new(PROFILE_PATH);
        if let Some(session_id) = request.get("session_id").and_then(Value::as_str) {
            credentials = credentials.with_cookie(self.config.session_name.as_str(), session_id);
        }
        if let Some(header) = request.get("authorization").and_then(Value::as_str) {
            credentials = credentials.with_authorization(header);
        }
        credentials
    }
}

fn field<'a>(request: &'a Value, name: &str) -> Result<&'a str, RequestError> {
    request
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| RequestError::BadRequest(format!("Missing field: {}", name)))
}

fn error_body(code: u16, message: &str) -> Value {
    json!({"status": "error", "code": code, "message": message})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthType, PasswordPolicy};
    use std::io::Cursor;

    fn handler() -> RequestHandler {
        RequestHandler::new(AuthConfig::default())
    }

    fn login(handler: &RequestHandler, email: &str, password: &str) -> Value {
        handler.handle(&json!({"op": "login", "email": email, "password": password}))
    }

    #[test]
    fn test_redact_lines() {
        let input = Cursor::new("name=Bob;password=secret;\nssn=123;date=today;\n");
        let mut out = Vec::new();
        let fields = vec!["password".to_string(), "ssn".to_string()];

        redact(input, &mut out, &fields, ";", "xxx").unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name=Bob;password=xxx;\nssn=xxx;date=today;\n"
        );
    }

    #[test]
    fn test_hash_password_writes_verifiable_hash() {
        let mut input = Cursor::new("hunter2\n");
        let mut out = Vec::new();

        hash_password(&mut input, &mut out).unwrap();

        let hash = String::from_utf8(out).unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(Argon2Hasher.verify(hash.trim_end(), "hunter2"));
    }

    #[test]
    fn test_handler_applies_configured_policy() {
        let config = AuthConfig {
            password_policy: PasswordPolicy {
                min_length: 8,
                ..PasswordPolicy::default()
            },
            ..AuthConfig::default()
        };
        let handler = RequestHandler::new(config);
        assert_eq!(handler.authority().password_policy().min_length, 8);

        let response =
            handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "short"}));
        assert_eq!(response["code"], 400);
    }

    #[test]
    fn test_serve_answers_one_line_per_request() {
        let handler = handler();
        let input = Cursor::new(concat!(
            "{\"op\": \"register\", \"email\": \"a@x.com\", \"password\": \"pw1\"}\n",
            "\n",
            "{\"op\": \"login\", \"email\": \"a@x.com\", \"password\": \"pw1\"}\n",
            "not json\n",
            "{\"op\": \"login\", \"email\": \"a@x.com\", \"password\": \"bad\"}\n",
        ));
        let mut out = Vec::new();

        serve(&handler, input, &mut out).unwrap();

        let output = String::from_utf8(out).unwrap();
        let responses: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let codes: Vec<u64> = responses.iter().map(|r| r["code"].as_u64().unwrap()).collect();
        assert_eq!(codes, [200, 200, 400, 401]);
        assert!(responses.iter().all(|r| r.get("event").is_none()));
    }

    #[test]
    fn test_unknown_and_missing_op() {
        let handler = handler();
        assert_eq!(handler.handle(&json!({"op": "delete_all"}))["code"], 400);
        assert_eq!(handler.handle(&json!({"email": "a@x.com"}))["code"], 400);
    }

    #[test]
    fn test_missing_field() {
        let response = handler().handle(&json!({"op": "register", "email": "a@x.com"}));
        assert_eq!(response["code"], 400);
        assert_eq!(response["message"], "Missing field: password");
    }

    #[test]
    fn test_register_login_profile_logout() {
        let handler = handler();

        let response =
            handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "pw1"}));
        assert_eq!(response["status"], "ok");

        let response =
            handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "pw2"}));
        assert_eq!(response["code"], 409);

        assert_eq!(login(&handler, "a@x.com", "wrong")["code"], 401);

        let response = login(&handler, "a@x.com", "pw1");
        assert_eq!(response["code"], 200);
        assert_eq!(response["data"]["session_name"], "_my_session_id");
        let session_id = response["data"]["session_id"].as_str().unwrap().to_string();

        let response = handler.handle(&json!({"op": "profile", "session_id": session_id}));
        assert_eq!(response["data"]["email"], "a@x.com");
        assert!(response["data"].get("hashed_password").is_none());

        let response = handler.handle(&json!({"op": "logout", "session_id": session_id}));
        assert_eq!(response["code"], 200);

        let response = handler.handle(&json!({"op": "profile", "session_id": session_id}));
        assert_eq!(response["code"], 403);
        let response = handler.handle(&json!({"op": "logout", "session_id": session_id}));
        assert_eq!(response["code"], 403);
    }

    #[test]
    fn test_profile_without_credentials() {
        let response = handler().handle(&json!({"op": "profile"}));
        assert_eq!(response["code"], 401);
    }

    #[test]
    fn test_reset_flow() {
        let handler = handler();
        handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "pw1"}));

        let response = handler.handle(&json!({"op": "reset_token", "email": "b@x.com"}));
        assert_eq!(response["code"], 403);

        let response = handler.handle(&json!({"op": "reset_token", "email": "a@x.com"}));
        let token = response["data"]["reset_token"].as_str().unwrap().to_string();

        let update = json!({
            "op": "update_password",
            "email": "a@x.com",
            "reset_token": token,
            "new_password": "pw2",
        });
        assert_eq!(handler.handle(&update)["code"], 200);
        assert_eq!(handler.handle(&update)["code"], 403);

        assert_eq!(login(&handler, "a@x.com", "pw1")["code"], 401);
        assert_eq!(login(&handler, "a@x.com", "pw2")["code"], 200);
    }

    #[test]
    fn test_session_auth_strategy_keeps_its_own_registry() {
        let config = AuthConfig {
            auth_type: AuthType::SessionAuth,
            ..AuthConfig::default()
        };
        let handler = RequestHandler::new(config);
        handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "pw1"}));

        let response = login(&handler, "a@x.com", "pw1");
        let session_id = response["data"]["session_id"].as_str().unwrap().to_string();

        let user = handler.authority().user_by_email("a@x.com").unwrap().unwrap();
        assert!(!user.has_session());

        let response = handler.handle(&json!({"op": "profile", "session_id": session_id}));
        assert_eq!(response["data"]["email"], "a@x.com");
    }

    #[test]
    fn test_no_strategy_resolves_through_authority() {
        let config = AuthConfig {
            auth_type: AuthType::None,
            ..AuthConfig::default()
        };
        let handler = RequestHandler::new(config);
        handler.handle(&json!({"op": "register", "email": "a@x.com", "password": "pw1"}));

        let response = login(&handler, "a@x.com", "pw1");
        let session_id = response["data"]["session_id"].as_str().unwrap().to_string();

        let response = handler.handle(&json!({"op": "profile", "session_id": session_id}));
        assert_eq!(response["data"]["email"], "a@x.com");
        assert_eq!(handler.handle(&json!({"op": "profile"}))["code"], 403);
    }
}
