use rocket::Route;

mod invites;

pub fn routes() -> Vec<Route> {
    invites::routes()
}
