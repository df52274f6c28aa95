use anyhow::Result;

use crate::{adapter::Caller, error::ApiError, schema::*};

async fn call_for<C: Caller + ?Sized>(connector: &C, params: RequestParams) -> Result<ResponseBody> {
    let method = params.method();
    let response = connector.call(ApiRequest::new(params)).await?;
    if !response.ok {
        return Err(ApiError::Telegram {
            code: response.error_code.unwrap_or_default(),
            description: response.description.unwrap_or_default(),
        }
        .into());
    }
    response.result.ok_or_else(|| ApiError::EmptyResponse(method).into())
}

pub async fn get_me<C: Caller + ?Sized>(connector: &C) -> Result<User> {
    call_for(connector, RequestParams::GetMe)
        .await?
        .into_user()
        .map_err(|e| ApiError::ResponseTypeError(e).into())
}

pub async fn get_updates<C: Caller + ?Sized>(connector: &C, param: GetUpdatesParams) -> Result<Vec<Update>> {
    call_for(connector, RequestParams::GetUpdates(param))
        .await?
        .into_updates()
        .map_err(|e| ApiError::ResponseTypeError(e).into())
}

pub async fn send_message<C: Caller + ?Sized>(connector: &C, param: SendMessageParams) -> Result<Message> {
    call_for(connector, RequestParams::SendMessage(param))
        .await?
        .into_message()
        .map_err(|e| ApiError::ResponseTypeError(e).into())
}

pub async fn send_photo<C: Caller + ?Sized>(connector: &C, param: SendPhotoParams) -> Result<Message> {
    call_for(connector, RequestParams::SendPhoto(param))
        .await?
        .into_message()
        .map_err(|e| ApiError::ResponseTypeError(e).into())
}

pub async fn edit_message_reply_markup<C: Caller + ?Sized>(
    connector: &C,
    param: EditMessageReplyMarkupParams,
) -> Result<()> {
    // 成功时返回被修改的消息，内联消息则只返回 true，两者都视为成功
    match call_for(connector, RequestParams::EditMessageReplyMarkup(param)).await? {
        ResponseBody::Message(_) | ResponseBody::Bool(true) => Ok(()),
        other => Err(ApiError::ResponseTypeError(other).into()),
    }
}

pub async fn answer_callback_query<C: Caller + ?Sized>(
    connector: &C,
    param: AnswerCallbackQueryParams,
) -> Result<bool> {
    call_for(connector, RequestParams::AnswerCallbackQuery(param))
        .await?
        .into_bool()
        .map_err(|e| ApiError::ResponseTypeError(e).into())
}
