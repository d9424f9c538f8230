//! Shared test utilities for integration tests
//!
//! Provides workspace fixtures shaped like a small Java service with a
//! known fault at `Auth.java:88`.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Line of `Auth.java` that dereferences the null token
pub const FAULT_LINE: usize = 88;

/// Stack trace pointing at the fault
pub const JAVA_TRACE: &str = "java.lang.NullPointerException: token is null
    at com.acme.auth.Auth.login(Auth.java:88)
    at com.acme.web.LoginController.submit(LoginController.java:21)
    at java.base/java.lang.Thread.run(Thread.java:833)
";

/// `Auth.java` body: filler lines with the faulty statement at `FAULT_LINE`
pub fn auth_java() -> String
{
    let mut body = String::from("package com.acme.auth;\n");
    for i in 2..=120
    {
        let line = match i
        {
            86 => "    public Session login(String user, String token) {".to_string(),
            87 => "        // refresh before use".to_string(),
            FAULT_LINE => "        String clean = token.trim();".to_string(),
            89 => "        return sessions.open(user, clean);".to_string(),
            90 => "    }".to_string(),
            _ => format!("    // line {i}"),
        };
        body.push_str(&line);
        body.push('\n');
    }
    body
}

pub fn controller_java() -> String
{
    let mut body = String::from("package com.acme.web;\n");
    for i in 2..=30
    {
        if i == 21
        {
            body.push_str("        return auth.login(form.user(), form.token());\n");
        }
        else
        {
            body.push_str(&format!("    // controller {i}\n"));
        }
    }
    body
}

/// On-disk workspace with sources, an excluded dependency dir and a binary
pub fn make_java_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/main/java/com/acme/auth/Auth.java")
        .write_str(&auth_java())
        .expect("write auth");
    tmp.child("src/main/java/com/acme/web/LoginController.java")
        .write_str(&controller_java())
        .expect("write controller");
    tmp.child("src/main/java/com/acme/auth/Session.java")
        .write_str("package com.acme.auth;\npublic class Session { String token; }\n")
        .expect("write session");

    // Excluded by default globs
    tmp.child("node_modules/auth-lib/index.js")
        .write_str("export function login(token) { return token.trim(); }\n")
        .expect("write node module");

    tmp.child("assets/logo.png")
        .write_binary(b"\x89PNG\r\n\x1a\n\0\0token")
        .expect("write binary");

    tmp
}
