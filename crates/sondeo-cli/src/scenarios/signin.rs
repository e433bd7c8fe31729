//! Streaming-service landing and sign-in checks.
//!
//! The suite runs headed with a one second slow-motion delay so a person can
//! follow along; `--headless --slow-mo 0` on the command line overrides both.

use futures::FutureExt;
use sondeo::{
    expect, expect_page, ConfigLayer, LocatorKind, LocatorSpec, MockElement, MockPage, MockSite, Reaction,
    SondeoResult, TestBody, TestCase, TestContext, TestGroup, TestSuite, TextMatcher,
};

/// Suite name
pub const SUITE_NAME: &str = "signin";

/// Site under test
pub const BASE_URL: &str = "https://www.netflix.com";

const HERO_TITLE: &str = "Unlimited movies, TV shows, and more.";

/// The sign-in suite
#[must_use]
pub fn suite() -> TestSuite {
    TestSuite::new(SUITE_NAME)
        .with_config(
            ConfigLayer::new()
                .with_base_url(BASE_URL)
                .with_headless(false)
                .with_slow_mo_ms(1000),
        )
        .group(
            TestGroup::new("landing")
                .test(TestCase::new("hero title is shown", hero_title))
                .test(TestCase::new("sign in link opens the login page", sign_in_link)),
        )
        .group(
            TestGroup::new("login form")
                .with_config(ConfigLayer::new().with_base_url(BASE_URL))
                .test(TestCase::new("email field is visible, editable and empty", email_field))
                .test(TestCase::new("password field is visible, editable and empty", password_field))
                .test(TestCase::new("remember me is checked by default", remember_me)),
        )
        .group(
            TestGroup::new("password toggle")
                .test(TestCase::new("toggle shows only while password has focus", toggle_follows_focus))
                .test(TestCase::new("toggle switches the input type", toggle_switches_type)),
        )
        .group(
            TestGroup::new("submission")
                .test(TestCase::new("invalid credentials show an alert", invalid_credentials))
                .test(TestCase::new("blank submission shows both field errors", blank_submission)),
        )
        .group(
            TestGroup::new("navigation")
                .test(TestCase::new("need help opens login help", need_help))
                .test(TestCase::new("sign up now opens the sign up page", sign_up))
                .test(TestCase::new("language selector switches to spanish and back", language_switch)),
        )
}

fn named(role: &str, pattern: &str) -> SondeoResult<LocatorSpec> {
    Ok(LocatorSpec::role(role).matching(TextMatcher::pattern_ci(pattern)?))
}

fn labelled(pattern: &str) -> SondeoResult<LocatorSpec> {
    Ok(LocatorSpec::new(LocatorKind::Label).matching(TextMatcher::pattern_ci(pattern)?))
}

async fn open_login(ctx: &TestContext) -> SondeoResult<()> {
    let _ = ctx.goto("/").await?;
    ctx.locate(named("link", "sign in")?).click().await
}

fn hero_title(ctx: &TestContext) -> TestBody<'_> {
    async move {
        let _ = ctx.goto("/").await?;
        let _ = expect(&ctx.locator(r#"[data-uia="hero-title"]"#))
            .to_have_text(HERO_TITLE)
            .await?;
        Ok(())
    }
    .boxed()
}

fn sign_in_link(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        let _ = expect_page(ctx)
            .to_have_url(TextMatcher::pattern(".*login")?)
            .await?;
        Ok(())
    }
    .boxed()
}

async fn check_empty_field(ctx: &TestContext, label: &str) -> SondeoResult<()> {
    open_login(ctx).await?;
    let field = ctx.locate(labelled(label)?);
    let _ = expect(&field).to_be_visible().await?;
    let _ = expect(&field).to_be_editable().await?;
    let _ = expect(&field).to_be_empty().await?;
    Ok(())
}

fn email_field(ctx: &TestContext) -> TestBody<'_> {
    check_empty_field(ctx, "email or phone number").boxed()
}

fn password_field(ctx: &TestContext) -> TestBody<'_> {
    check_empty_field(ctx, "password").boxed()
}

fn remember_me(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        let _ = expect(&ctx.locate(labelled("remember me")?))
            .to_be_checked()
            .await?;
        Ok(())
    }
    .boxed()
}

fn toggle_follows_focus(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        let password = ctx.locate(labelled("password")?);
        let toggle = ctx.locator("#id_password_toggle");

        let _ = expect(&toggle).to_be_hidden().await?;
        password.focus().await?;
        let _ = expect(&toggle).to_be_visible().await?;
        password.blur().await?;
        let _ = expect(&toggle).to_be_hidden().await?;
        Ok(())
    }
    .boxed()
}

fn toggle_switches_type(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        let password = ctx.locate(labelled("password")?);
        let toggle = ctx.locator("#id_password_toggle");

        let _ = expect(&password).to_have_attribute("type", "password").await?;
        password.focus().await?;
        let _ = expect(&toggle).to_be_visible().await?;
        toggle.click().await?;
        let _ = expect(&password).to_have_attribute("type", "text").await?;
        toggle.click().await?;
        let _ = expect(&password).to_have_attribute("type", "password").await?;
        Ok(())
    }
    .boxed()
}

fn invalid_credentials(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        ctx.locate(labelled("email or phone number")?)
            .fill("bad@email.com")
            .await?;
        ctx.locate(labelled("password")?).fill("password").await?;
        ctx.locate(named("button", "sign in")?).click().await?;
        let _ = expect(&ctx.get_by_role("alert")).to_be_visible().await?;
        Ok(())
    }
    .boxed()
}

fn blank_submission(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        ctx.locate(named("button", "sign in")?).click().await?;
        let _ = expect(&ctx.locator(r#"[data-uia="login-field+error"]"#))
            .to_be_visible()
            .await?;
        let _ = expect(&ctx.locator(r#"[data-uia="password-field+error"]"#))
            .to_be_visible()
            .await?;
        Ok(())
    }
    .boxed()
}

fn need_help(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        ctx.locate(named("link", "need help")?).click().await?;
        let _ = expect_page(ctx)
            .to_have_url(TextMatcher::pattern(".*LoginHelp")?)
            .await?;
        Ok(())
    }
    .boxed()
}

fn sign_up(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        ctx.locate(named("link", "sign up now")?).click().await?;
        let _ = expect_page(ctx).to_have_url(TextMatcher::pattern(".*")?).await?;
        let _ = expect_page(ctx).to_have_ok_response().await?;
        Ok(())
    }
    .boxed()
}

fn language_switch(ctx: &TestContext) -> TestBody<'_> {
    async move {
        open_login(ctx).await?;
        let selector = ctx.get_by_placeholder("lang-switcher");

        selector.select_option("/us-es/login").await?;
        let _ = expect_page(ctx)
            .to_have_url(TextMatcher::pattern(r".*us-es/login")?)
            .await?;

        selector.select_option("/login").await?;
        let _ = expect_page(ctx)
            .to_have_url(TextMatcher::pattern(".*login")?)
            .await?;
        let _ = expect_page(ctx)
            .not()
            .to_have_url(TextMatcher::pattern("us-es")?)
            .await?;
        Ok(())
    }
    .boxed()
}

/// Replica of the landing, login, login-help and Spanish login pages
#[must_use]
pub fn replica_site() -> MockSite {
    MockSite::new()
        .with_page(
            "https://www.netflix.com/",
            MockPage::new()
                .with_element(
                    MockElement::heading("hero-title", HERO_TITLE)
                        .with_attribute("data-uia", "hero-title"),
                )
                .with_element(MockElement::link("signIn", "Sign In", "/login")),
        )
        .with_page("https://www.netflix.com/login", login_page(&ENGLISH, "/login"))
        .with_page("https://www.netflix.com/us-es/login", login_page(&SPANISH, "/us-es/login"))
        .with_page(
            "https://www.netflix.com/LoginHelp",
            MockPage::new().with_element(MockElement::heading("help-title", "Forgot Email/Password")),
        )
}

struct LoginCopy {
    title: &'static str,
    email: &'static str,
    password: &'static str,
    toggle: &'static str,
    remember: &'static str,
    submit: &'static str,
    help: &'static str,
    sign_up: &'static str,
    email_error: &'static str,
    password_error: &'static str,
    alert: &'static str,
}

const ENGLISH: LoginCopy = LoginCopy {
    title: "Sign In",
    email: "Email or phone number",
    password: "Password",
    toggle: "Show password",
    remember: "Remember me",
    submit: "Sign In",
    help: "Need help?",
    sign_up: "Sign up now",
    email_error: "Please enter a valid email or phone number.",
    password_error: "Your password must contain between 4 and 60 characters.",
    alert: "Incorrect password for bad@email.com",
};

const SPANISH: LoginCopy = LoginCopy {
    title: "Inicia sesión",
    email: "Email o número de teléfono",
    password: "Contraseña",
    toggle: "Mostrar contraseña",
    remember: "Recuérdame",
    submit: "Iniciar sesión",
    help: "¿Necesitas ayuda?",
    sign_up: "Suscríbete ya",
    email_error: "Escribe un email o un número de teléfono válido.",
    password_error: "La contraseña debe tener entre 4 y 60 caracteres.",
    alert: "Contraseña incorrecta",
};

fn login_page(copy: &LoginCopy, current: &str) -> MockPage {
    let mut languages = MockElement::combobox("lang-switcher", "Select language", &["/login", "/us-es/login"])
        .with_placeholder("lang-switcher")
        .on_change(Reaction::NavigateToValue);
    languages.value = Some(current.to_string());

    MockPage::new()
        .with_element(MockElement::heading("login-title", copy.title))
        .with_element(MockElement::textbox("id_userLoginId", copy.email))
        .with_element(MockElement::password("id_password", copy.password))
        .with_element(
            MockElement::button("id_password_toggle", copy.toggle)
                .visible_while_focused(&["id_password", "id_password_toggle"])
                .on_click(Reaction::ToggleAttribute {
                    target: "id_password".into(),
                    name: "type".into(),
                    values: ["password".into(), "text".into()],
                }),
        )
        .with_element(MockElement::checkbox("bxid_rememberMe_true", copy.remember, true))
        .with_element(
            MockElement::button("login-submit", copy.submit)
                .with_attribute("type", "submit")
                .on_click(Reaction::RevealIfEmpty {
                    field: "id_userLoginId".into(),
                    target: "login-field-error".into(),
                })
                .on_click(Reaction::RevealIfEmpty {
                    field: "id_password".into(),
                    target: "password-field-error".into(),
                })
                .on_click(Reaction::RevealIfFilled {
                    fields: vec!["id_userLoginId".into(), "id_password".into()],
                    target: "login-alert".into(),
                }),
        )
        .with_element(
            MockElement::new("login-field-error", "div")
                .with_attribute("data-uia", "login-field+error")
                .with_text(copy.email_error)
                .hidden(),
        )
        .with_element(
            MockElement::new("password-field-error", "div")
                .with_attribute("data-uia", "password-field+error")
                .with_text(copy.password_error)
                .hidden(),
        )
        .with_element(MockElement::alert("login-alert", copy.alert))
        .with_element(MockElement::link("login-help", copy.help, "/LoginHelp"))
        .with_element(MockElement::link("sign-up", copy.sign_up, "/"))
        .with_element(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sondeo::{MockEngine, Selection, SessionManager, TestRunner};
    use std::sync::Arc;

    fn fast() -> ConfigLayer {
        ConfigLayer::new()
            .with_headless(true)
            .with_slow_mo_ms(0)
            .with_timeout_ms(500)
            .with_action_timeout_ms(200)
    }

    mod suite_tests {
        use super::*;

        #[test]
        fn test_suite_shape() {
            let suite = suite();
            assert_eq!(suite.name(), SUITE_NAME);
            assert_eq!(suite.test_count(), 12);
            assert_eq!(suite.layer().slow_mo_ms, Some(1000));
            assert_eq!(suite.layer().headless, Some(false));
        }

        #[test]
        fn test_names_are_unique() {
            let planned = suite().plan(&Selection::all());
            let mut names: Vec<_> = planned.iter().map(|t| t.name.clone()).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), planned.len());
        }

        #[test]
        fn test_replica_pages() {
            let site = replica_site();
            assert_eq!(site.len(), 4);
            assert!(site.page("https://www.netflix.com/us-es/login").is_some());
        }
    }

    mod replica_tests {
        use super::*;

        #[tokio::test]
        async fn test_suite_passes_on_replica() {
            let engine = Arc::new(MockEngine::new(replica_site()));
            let report = TestRunner::new(SessionManager::new(engine.clone()))
                .with_overrides(fast())
                .run(&suite(), &Selection::all())
                .await;

            assert!(report.all_passed(), "{}", report.render_text());
            assert_eq!(report.passed_count(), 12);
            assert_eq!(engine.open_contexts(), 0);
        }

        #[tokio::test]
        async fn test_broken_replica_fails_with_diagnostics() {
            let site = MockSite::new().with_page(
                "https://www.netflix.com/",
                MockPage::new().with_element(
                    MockElement::heading("hero-title", "Something else")
                        .with_attribute("data-uia", "hero-title"),
                ),
            );
            let engine = Arc::new(MockEngine::new(site));
            let report = TestRunner::new(SessionManager::new(engine))
                .with_overrides(fast())
                .run(&suite(), &Selection::parse(&["hero title"]).unwrap())
                .await;

            assert_eq!(report.failed_count(), 1);
            let failure = report.results[0].failure.as_ref().unwrap();
            assert_eq!(failure.kind, "assertion");
            assert!(failure.last_observed.as_deref().unwrap().contains("Something else"));
        }
    }
}
