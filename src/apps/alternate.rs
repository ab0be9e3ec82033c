//! The `alternate` application, a second independent route table.

use crate::router::{HandlerArg, Router};
use anyhow::{anyhow, Result};

pub fn build() -> Router {
    let mut router = Router::new();
    router.get("/greet/:name", greet).get("/square/:n", square);
    router
}

fn greet(arg: HandlerArg) -> Result<String> {
    Ok(format!("Greetings, {}!", arg.param("name").unwrap_or_default()))
}

fn square(arg: HandlerArg) -> Result<String> {
    let raw = arg.param("n").unwrap_or_default();
    let n: i64 = raw.parse().map_err(|_| anyhow!("'{raw}' is not an integer"))?;
    let squared = n
        .checked_mul(n)
        .ok_or_else(|| anyhow!("square of {n} overflows"))?;
    Ok(format!("Square of {n} is {squared}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn test_routes() {
        let router = build();
        assert_eq!(
            router.handle(&Request::new("/greet/Ada")).unwrap(),
            "Greetings, Ada!"
        );
        assert_eq!(
            router.handle(&Request::new("/square/-4")).unwrap(),
            "Square of -4 is 16"
        );
        // The demo app's routes do not exist here
        assert_eq!(
            router.handle(&Request::new("/hello/Ada")).unwrap(),
            "No handler for GET /hello/Ada"
        );
    }
}
