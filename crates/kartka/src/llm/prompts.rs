//! Prompt templates for the vision model calls.
//!
//! The cards are handwritten in Russian or Ukrainian, so the instructions are
//! in Russian. Every prompt ends with the exact JSON shape expected back.

/// Variant detection from the header band.
pub const VARIANT_SYSTEM: &str = "\
На изображении верхняя часть бланка Всесоюзной переписи 1926 года. \
Определи язык печатного заголовка.\n\
- «СІМЕЙНА КАРТКА», «ВСЕСОЮЗНИЙ ПЕРЕПИС НАСЕЛЕННЯ» означает ua.\n\
- «СЕМЕЙНАЯ КАРТА», «ВСЕСОЮЗНАЯ ПЕРЕПИСЬ НАСЕЛЕНИЯ» означает ru.\n\
Ответ строго JSON: {\"variant\":\"ua\"|\"ru\",\"confidence\":0..1}.";

pub const VARIANT_USER: &str = "Язык печатного заголовка: ua или ru? Только JSON.";

/// Nationality mark on the front page.
pub const NATIONALITY_SYSTEM: &str = "\
Ты внимательный генеалогический ассистент. На изображении короткая рукописная \
пометка национальности на русском или украинском языке. Нужно решить, \
обозначает ли она именно еврейскую национальность.\n\n\
Пометки «укр.», «рус.», «бел.», «поляк», «арм.», «тат.», «українець» и подобные \
НЕ еврейские: для них is_jewish=false.\n\
Еврейские пометки: «еврей», «евр.», «євр.», «иудей», «иуд.». Всё остальное false.\n\n\
В поле match перепиши найденную пометку как есть.\n\
Ответ строго JSON: {\"is_jewish\": true|false, \"match\": \"пометка_или_null\", \"confidence\": 0..1}.";

pub const NATIONALITY_USER: &str =
    "Указывает ли пометка на еврейскую национальность? Ответ ровно одним JSON.";

/// Surname band on the list page. The first roster row is the household head.
pub const BAND_SYSTEM: &str = "\
На изображении столбец списка членов семьи (вторая страница карточки). \
Первая строка списка относится к главе семьи. Прочитай в ней фамилию и \
инициалы имени и отчества.\n\
Ответ строго JSON: {\"surname\":\"...\",\"initials\":{\"name\":\"И|null\",\"patronymic\":\"О|null\"}}. \
Только кириллица.";

pub const BAND_USER: &str = "Фамилия и инициалы из первой строки. Ответ ровно одним JSON.";

/// Page-type classification from header + sidebar composite.
pub const PAGE_TYPE_SYSTEM: &str = "\
На изображении две полосы одного скана карточки переписи 1926 года: сверху \
заголовок страницы, снизу левое поле страницы.\n\
- front: лицевая сторона, заголовок «СІМЕЙНА КАРТКА» или «СЕМЕЙНАЯ КАРТА», \
анкетные вопросы о главе семьи.\n\
- list: оборотная сторона, таблица со списком членов семьи по строкам.\n\
- other: обложка, пустой лист, опись или что-либо ещё.\n\
Ответ строго JSON: {\"type\":\"front\"|\"list\"|\"other\",\"confidence\":0..1,\"reason\":\"кратко\"}.";

pub const PAGE_TYPE_USER: &str = "Какая это страница: front, list или other? Только JSON.";

pub const FIO_USER: &str = "\
Прочитай ФИО главы семьи на вырезке. Фамилию бери прежде всего с вырезки, \
подсказку используй для первой буквы. Имя и отчество восстанавливай по \
инициалам только если на вырезке неразборчиво. Если отчество сомнительно, \
верни null. Ответ ровно одним JSON по схеме.";

/// Front-page full name, with list-page readings embedded as soft hints.
///
/// Empty initials are rendered as `null` so the model sees an explicit
/// "no hint" rather than an empty string.
pub fn fio_system_prompt(surname_hint: &str, init_name: &str, init_patronymic: &str) -> String {
    let name_hint = if init_name.is_empty() { "null" } else { init_name };
    let patronymic_hint = if init_patronymic.is_empty() {
        "null"
    } else {
        init_patronymic
    };

    format!(
        r#"Изображение: строка с полным ФИО главы семьи с лицевой стороны карточки.
Подсказка со списка семьи (оборот): фамилия примерно «{surname_hint}», инициал имени «{name_hint}», инициал отчества «{patronymic_hint}».
Украинские буквы в инициалах приводи к русским: І→И, Ї→И, Є→Е, Ґ→Г. Пиши только по-русски, Ё можно заменять на Е.

Правила:
1) Фамилию читай прежде всего с этой вырезки, она крупнее. Фамилию из подсказки используй лишь для сверки первой буквы и общих сочетаний букв.
2) Инициалы из подсказки только мягкая проверка. Если вырезка ясно даёт имя и отчество, доверяй вырезке, даже когда инициалы не совпадают.
3) Если вырезка нечитаема, опирайся на инициалы. Избегай искажений распознавания.

В raw.front_text перепиши строку ФИО с вырезки целиком, как видишь.
Ответ строго JSON в UTF-8 без комментариев:
{{"surname":"...","name":"...","patronymic":"...|null",
  "raw":{{"front_text":"...|null"}},
  "hints":{{"surname_hint":"{surname_hint}","initials_hint":{{"name":"{name_hint}","patronymic":"{patronymic_hint}"}}}},
  "surname_source":"front|list|blend",
  "confidence":0..1}}"#
    )
}
