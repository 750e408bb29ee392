//! session_report - tell the SMF that downlink data has arrived for an idle session

use crate::userplane::DownlinkDataNotification;
use crate::{HandlerApi, Procedure};
use derive_deref::{Deref, DerefMut};
use pfcp::{PfcpHeader, PfcpMessage, SessionReportRequest, SessionReportResponse};
use slog::{Logger, debug, info, warn};

#[derive(Deref, DerefMut)]
pub struct SessionReportProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> SessionReportProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        SessionReportProcedure(Procedure::new(api, logger))
    }

    // Session Report Procedure
    // 1.    Pfcp SessionReportRequest <<
    // 2.    Pfcp SessionReportResponse >>
    pub async fn run(&self, notification: DownlinkDataNotification) {
        let DownlinkDataNotification { seid, pdr_id } = notification;
        let Some(session) = self.registry().find_by_seid(seid) else {
            debug!(self.logger, "Downlink data notification for deleted session {seid}");
            return;
        };

        // Several packets may have been notified before the first report went out.
        if session.srr_flag {
            debug!(self.logger, "Report already pending for session {seid}");
            return;
        }

        let request = SessionReportRequest::downlink_data(pdr_id)
            .encode(Some(session.remote_seid), self.next_sequence_number());
        self.log_message("<< SessionReportRequest");
        if let Err(e) = self.send_pfcp(&request, session.peer).await {
            warn!(self.logger, "Failed to send Session Report Request - {e}");
            return;
        }
        info!(
            self.logger,
            "Reported downlink data on PDR {pdr_id} of session {seid} to {}", session.peer
        );

        let mut session = (*session).clone();
        session.srr_flag = true;
        self.registry().commit(session);
    }

    pub fn handle_response(&self, header: &PfcpHeader, r: SessionReportResponse) {
        self.log_message(">> SessionReportResponse");
        let seid = header.seid.unwrap_or(0);
        if r.cause.is_accepted() {
            debug!(self.logger, "Session report for session {seid} accepted");
        } else {
            warn!(
                self.logger,
                "Session report for session {seid} rejected with cause {:?}", r.cause
            );
        }
    }
}
