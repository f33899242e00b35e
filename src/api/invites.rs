use rocket::{
    response::stream::{Event, EventStream},
    serde::json::Json,
    tokio::{select, sync::broadcast::error::RecvError},
    Route, Shutdown, State,
};

use crate::{
    config::Config,
    invite::{CandidateFilter, DispatchResult, Invites, TemplateCache},
    mailer::Brevo,
    model::{
        auth::AuthToken,
        election::Election,
        event::NewInviteSentEvent,
        mongodb::{Coll, Id},
    },
    notify::ElectionUpdates,
};

pub fn routes() -> Vec<Route> {
    routes![send_invites, election_updates]
}

/// Invite the candidates of an election selected by `filter` (`ALL` if
/// omitted). Responds with the invitations that went out, or an empty list if
/// the run could not start.
#[allow(clippy::too_many_arguments)]
#[post("/elections/<election_id>/invites?<filter>")]
async fn send_invites(
    token: Option<AuthToken>,
    election_id: Id,
    filter: Option<String>,
    config: &State<Config>,
    templates: &State<TemplateCache>,
    brevo: &State<Brevo>,
    elections: Coll<Election>,
    events: Coll<NewInviteSentEvent>,
    updates: &State<ElectionUpdates>,
) -> Json<Vec<DispatchResult>> {
    let invites = Invites {
        config: config.inner(),
        templates: templates.inner(),
        lookup: brevo.inner(),
        sender: brevo.inner(),
        elections: &elections,
        events: &events,
        notifier: updates.inner(),
    };
    let filter = filter.as_deref().unwrap_or(CandidateFilter::default().name());
    Json(invites.send(token.as_ref(), election_id, filter).await)
}

/// Stream the updates for one election as they are published.
#[get("/elections/<election_id>/updates")]
fn election_updates(
    _token: AuthToken,
    election_id: Id,
    updates: &State<ElectionUpdates>,
    mut shutdown: Shutdown,
) -> EventStream![] {
    let mut receiver = updates.subscribe();
    EventStream! {
        loop {
            let update = select! {
                update = receiver.recv() => match update {
                    Ok(update) => update,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Observer of election {election_id} missed {missed} updates");
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };
            if update.election_id == election_id {
                yield Event::json(&update);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{
        http::{Cookie, Status},
        local::asynchronous::Client,
    };

    use super::*;
    use crate::model::election::Questions;

    fn login(client: &Client) -> Cookie<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        AuthToken::new(Id::new()).into_cookie(config).unwrap()
    }

    async fn post_invites(
        client: &Client,
        cookie: Option<Cookie<'static>>,
        uri: String,
    ) -> Vec<DispatchResult> {
        let mut request = client.post(uri);
        if let Some(cookie) = cookie {
            request = request.cookie(cookie);
        }
        let response = request.dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.unwrap()
    }

    #[backend_test]
    async fn anonymous_caller_gets_nothing(client: Client, elections: Coll<Election>) {
        let election = Election::example();
        elections.insert_one(&election, None).await.unwrap();

        let results =
            post_invites(&client, None, format!("/elections/{}/invites", election.id)).await;

        assert!(results.is_empty());
    }

    #[backend_test]
    async fn unknown_filter_gets_nothing(
        client: Client,
        elections: Coll<Election>,
        events: Coll<NewInviteSentEvent>,
    ) {
        let election = Election::example();
        elections.insert_one(&election, None).await.unwrap();
        let cookie = login(&client);

        let results = post_invites(
            &client,
            Some(cookie),
            format!("/elections/{}/invites?filter=EVERYONE", election.id),
        )
        .await;

        assert!(results.is_empty());
        assert_eq!(events.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn election_that_is_not_ready_gets_nothing(
        client: Client,
        elections: Coll<Election>,
        events: Coll<NewInviteSentEvent>,
    ) {
        let mut election = Election::example();
        election.questions = Questions::texts(&["What would you change first?"]);
        elections.insert_one(&election, None).await.unwrap();
        let cookie = login(&client);

        let results = post_invites(
            &client,
            Some(cookie),
            format!("/elections/{}/invites?filter=ALL", election.id),
        )
        .await;

        assert!(results.is_empty());
        assert_eq!(
            events
                .count_documents(doc! {"parentId": election.id}, None)
                .await
                .unwrap(),
            0
        );
    }

    #[backend_test]
    async fn missing_election_gets_nothing(client: Client) {
        let cookie = login(&client);

        let results = post_invites(
            &client,
            Some(cookie),
            format!("/elections/{}/invites", Id::new()),
        )
        .await;

        assert!(results.is_empty());
    }

    #[backend_test]
    async fn updates_need_a_login(client: Client) {
        let response = client
            .get(format!("/elections/{}/updates", Id::new()))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::NotFound);
    }
}
